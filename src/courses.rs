use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    NotReady,
    InProgress,
    Ready,
}

impl Readiness {
    pub fn from_progress(progress: u8) -> Self {
        match progress {
            0 => Readiness::NotReady,
            100.. => Readiness::Ready,
            _ => Readiness::InProgress,
        }
    }
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Readiness::NotReady => "not ready",
            Readiness::InProgress => "in progress",
            Readiness::Ready => "ready",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub title: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub file_type: String,
    /// Percentage of the outline already studied.
    pub progress: u8,
    pub topics: Vec<Topic>,
    pub has_quiz: bool,
}

impl Course {
    pub fn readiness(&self) -> Readiness {
        Readiness::from_progress(self.progress)
    }

    /// Text of the course page: header line, description and numbered outline.
    pub fn outline(&self) -> String {
        let mut text = format!(
            "{} ({}%, {})\n{}\nfile-type: {}\n",
            self.title,
            self.progress.min(100),
            self.readiness(),
            self.description,
            self.file_type
        );
        if self.topics.is_empty() {
            text.push_str("\nNo outline yet");
        }
        for (i, topic) in self.topics.iter().enumerate() {
            text.push_str(&format!("\n{}. {}\n   {}", i + 1, topic.title, topic.summary));
        }
        text
    }
}

pub struct Catalog {
    courses: Vec<Course>,
}

impl Catalog {
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn find(&self, id: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&Course> {
        self.courses.iter().find(|c| c.title == title)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            Course {
                id: "mathematics".to_string(),
                title: "Mathematics".to_string(),
                description: "Mathematics is the study of numbers, shapes, and patterns.".to_string(),
                file_type: "pdf".to_string(),
                progress: 0,
                topics: Vec::new(),
                has_quiz: false,
            },
            Course {
                id: "intro-to-compiler".to_string(),
                title: "Intro to Compiler".to_string(),
                description: "intro to compiler for hnd 2".to_string(),
                file_type: "pdf".to_string(),
                progress: 40,
                topics: vec![
                    Topic {
                        title: "Compilation Process".to_string(),
                        summary: "Compilation Process and engineering".to_string(),
                    },
                    Topic {
                        title: "Programming Paradigms".to_string(),
                        summary: "Object-oriented programming and APIs".to_string(),
                    },
                    Topic {
                        title: "Databases".to_string(),
                        summary: "What a database is and how data is organized".to_string(),
                    },
                ],
                has_quiz: true,
            },
        ])
    }
}
