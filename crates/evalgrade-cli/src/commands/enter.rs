//! The `evalgrade enter` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;

use evalgrade_core::config::load_config_from;
use evalgrade_core::flush::{FlushQueue, MemoryStore};
use evalgrade_core::model::{Component, PartKey};
use evalgrade_core::session::EntrySession;

/// One `--set` argument.
#[derive(Debug, PartialEq)]
struct MarkEntry {
    student_id: String,
    target: Option<String>,
    value: f64,
}

fn parse_mark(raw: &str) -> Result<MarkEntry> {
    let (lhs, value) = raw
        .rsplit_once('=')
        .with_context(|| format!("expected `student:target=value`, got `{raw}`"))?;
    let value: f64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid marks in `{raw}`"))?;
    let (student_id, target) = match lhs.split_once(':') {
        Some((student, target)) => (student.trim(), Some(target.trim().to_string())),
        None => (lhs.trim(), None),
    };
    if student_id.is_empty() {
        bail!("missing student id in `{raw}`");
    }
    Ok(MarkEntry {
        student_id: student_id.to_string(),
        target,
        value,
    })
}

pub async fn execute(
    records_path: PathBuf,
    config_path: Option<PathBuf>,
    component: String,
    marks: Vec<String>,
    test_date: Option<NaiveDate>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let component: Component = component.parse()?;
    let entries = marks
        .iter()
        .map(|m| parse_mark(m))
        .collect::<Result<Vec<_>>>()?;

    let records = if records_path.exists() {
        super::load_records(&records_path)?
    } else {
        Vec::new()
    };

    let mut session = EntrySession::open(&config, component)?;
    session.load(&records);

    let store = Arc::new(MemoryStore::new());
    store.seed(&config.course_id, records);
    let queue = FlushQueue::new(store.clone(), config.debounce);

    if let Some(date) = test_date {
        session.set_test_date(Some(date))?;
    }

    for entry in &entries {
        apply(&mut session, entry)?;
        queue.enqueue(session.snapshot()).await;
    }
    if test_date.is_some() && entries.is_empty() {
        queue.enqueue(session.snapshot()).await;
    }

    let revision = queue.flush_now().await?;
    super::save_records(&records_path, &store.records(&config.course_id))?;

    for entry in &entries {
        let scaled = session.scaled(&entry.student_id).unwrap_or(0.0);
        println!("{}: {component} = {scaled}", entry.student_id);
    }
    if let Some(revision) = revision {
        println!(
            "Saved revision {revision} of {component} to {}",
            records_path.display()
        );
    }

    Ok(())
}

fn apply(session: &mut EntrySession, entry: &MarkEntry) -> Result<()> {
    let student = entry.student_id.as_str();
    match (session.component(), entry.target.as_deref()) {
        (Component::Ca1 | Component::Ca2 | Component::Ca3, Some(target)) => {
            let key: PartKey = target.parse()?;
            if !session.set_part(student, key, entry.value)? {
                eprintln!("{student}: part {key} has no weight, ignoring");
            }
        }
        (Component::Lab, Some(target)) => {
            let index: u32 = target
                .parse()
                .with_context(|| format!("invalid lab session index `{target}`"))?;
            let existing = session
                .lab_score(student)
                .map(|lab| lab.sessions().len() as u32)
                .unwrap_or(0);
            if index > existing {
                for _ in existing.max(2)..index {
                    session.add_lab_session(student, None)?;
                }
            }
            session.set_lab_marks(student, index, entry.value)?;
        }
        (Component::Assignment, None) => {
            session.set_assignment(student, entry.value)?;
        }
        (component, _) => bail!(
            "marks for {student} do not fit {component}; use student:part for CA, student:session for LAB, student=marks for ASSIGNMENT"
        ),
    }
    Ok(())
}
