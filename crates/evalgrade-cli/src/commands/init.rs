//! The `evalgrade init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create evalgrade.toml
    if std::path::Path::new("evalgrade.toml").exists() {
        println!("evalgrade.toml already exists, skipping.");
    } else {
        std::fs::write("evalgrade.toml", SAMPLE_CONFIG)?;
        println!("Created evalgrade.toml");
    }

    // Create sample records
    std::fs::create_dir_all("records")?;
    let records_path = std::path::Path::new("records/sample.json");
    if records_path.exists() {
        println!("records/sample.json already exists, skipping.");
    } else {
        std::fs::write(records_path, SAMPLE_RECORDS)?;
        println!("Created records/sample.json");
    }

    println!("\nNext steps:");
    println!("  1. Edit evalgrade.toml with your course and part weights");
    println!("  2. Run: evalgrade validate");
    println!("  3. Run: evalgrade evaluate --records records/sample.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# evalgrade course configuration

[course]
id = "CS201"
name = "Data Structures"
type = "UG-Integrated"
academic_year = "2024-25"

# Part weights per CA paper: 5 questions (I-V) x 4 parts (a-d).
# The 20 weights may total at most 50. Missing parts weigh 0.
[weights.CA1]
configured = true

[weights.CA1.parts]
Ia = 2.5
Ib = 2.5
Ic = 2.5
Id = 2.5
IIa = 2.5
IIb = 2.5
IIc = 2.5
IId = 2.5
IIIa = 2.5
IIIb = 2.5
IIIc = 2.5
IIId = 2.5
IVa = 2.5
IVb = 2.5
IVc = 2.5
IVd = 2.5
Va = 2.5
Vb = 2.5
Vc = 2.5
Vd = 2.5

[weights.CA2]
configured = false

[weights.CA3]
configured = false

# Override a built-in scale:
# [[scales]]
# course_type = "UG-Integrated"
# component = "LAB"
# max_marks = 30
# passing_marks = 15

# Override the aggregate pass mark:
# [totals]
# "UG-Integrated" = 50

[flush]
debounce_ms = 1500
"#;

const SAMPLE_RECORDS: &str = r#"[
  {
    "studentId": "21CS001",
    "academicYear": "2024-25",
    "scores": [
      {"componentName": "CA1", "maxMarks": 20, "obtainedMarks": 20, "testDate": "2024-09-12"},
      {"componentName": "ASSIGNMENT", "maxMarks": 10, "obtainedMarks": 8},
      {"componentName": "LAB", "maxMarks": 30, "obtainedMarks": 24}
    ],
    "questions": [
      {"questionNumber": 1, "meta": {"component": "CA1", "date": "2024-09-12"},
       "parts": [
         {"partName": "a", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "b", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "c", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "d", "maxMarks": 2.5, "obtainedMarks": 2.5}
       ]},
      {"questionNumber": 2, "meta": {"component": "CA1", "date": "2024-09-12"},
       "parts": [
         {"partName": "a", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "b", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "c", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "d", "maxMarks": 2.5, "obtainedMarks": 2.5}
       ]},
      {"questionNumber": 3, "meta": {"component": "CA1", "date": "2024-09-12"},
       "parts": [
         {"partName": "a", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "b", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "c", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "d", "maxMarks": 2.5, "obtainedMarks": 2.5}
       ]},
      {"questionNumber": 4, "meta": {"component": "CA1", "date": "2024-09-12"},
       "parts": [
         {"partName": "a", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "b", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "c", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "d", "maxMarks": 2.5, "obtainedMarks": 2.5}
       ]},
      {"questionNumber": 5, "meta": {"component": "CA1", "date": "2024-09-12"},
       "parts": [
         {"partName": "a", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "b", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "c", "maxMarks": 2.5, "obtainedMarks": 2.5},
         {"partName": "d", "maxMarks": 2.5, "obtainedMarks": 1.5}
       ]}
    ],
    "lab_sessions": [
      {"date": "2024-08-05", "maxMarks": 10, "obtainedMarks": 8, "index": 1},
      {"date": "2024-08-12", "maxMarks": 10, "obtainedMarks": 6, "index": 2},
      {"date": "2024-08-19", "maxMarks": 10, "obtainedMarks": 10, "index": 3}
    ]
  },
  {
    "studentId": "21CS002",
    "academicYear": "2024-25",
    "scores": [
      {"componentName": "ASSIGNMENT", "maxMarks": 10, "obtainedMarks": 9}
    ],
    "lab_sessions": [
      {"date": "2024-08-05", "maxMarks": 10, "obtainedMarks": 3, "index": 1},
      {"date": "2024-08-12", "maxMarks": 10, "obtainedMarks": 4, "index": 2}
    ]
  }
]
"#;
