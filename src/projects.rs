use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    InProgress,
    Complete,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Complete => "complete",
        }
    }

    pub fn from_stored(s: &str) -> Self {
        match s {
            "complete" => ProjectStatus::Complete,
            _ => ProjectStatus::InProgress,
        }
    }
}

/// A tracked project or task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub name: String,
    pub assignees: Vec<String>,
    pub percent: u8,
    pub description: String,
    pub planned_date: Option<NaiveDate>,
    pub actual_date: Option<NaiveDate>,
    pub status: ProjectStatus,
    pub created_at: NaiveDateTime,
}

impl Project {
    /// Days between creation and actual completion.
    pub fn duration_days(&self) -> Option<i64> {
        self.actual_date
            .map(|done| (done - self.created_at.date()).num_days())
    }

    /// `field: value` pairs used for notifications and plain-text output.
    pub fn notification_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("Название".to_string(), self.name.clone()),
            ("Исполнитель".to_string(), self.assignees.join(", ")),
            ("Процент выполнения".to_string(), format!("{}%", self.percent)),
            ("Описание".to_string(), self.description.clone()),
        ];
        if let Some(d) = self.planned_date {
            fields.push(("Срок исполнения".to_string(), d.format("%d-%m-%Y").to_string()));
        }
        if let Some(d) = self.actual_date {
            fields.push(("Дата выполнения".to_string(), d.format("%d-%m-%Y").to_string()));
        }
        fields
    }
}

/// Form input for creating a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub assignees: Vec<String>,
    pub percent: u8,
    pub description: String,
    pub planned_date: Option<NaiveDate>,
}

impl NewProject {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("project name is empty".into()));
        }
        validate_percent(self.percent)
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub assignees: Option<Vec<String>>,
    pub percent: Option<u8>,
    pub description: Option<String>,
    pub planned_date: Option<NaiveDate>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.assignees.is_none()
            && self.percent.is_none()
            && self.description.is_none()
            && self.planned_date.is_none()
    }

    pub fn apply(&self, project: &mut Project) -> Result<()> {
        if let Some(percent) = self.percent {
            validate_percent(percent)?;
            project.percent = percent;
        }
        if let Some(ref assignees) = self.assignees {
            project.assignees = assignees.clone();
        }
        if let Some(ref description) = self.description {
            project.description = description.clone();
        }
        if let Some(date) = self.planned_date {
            project.planned_date = Some(date);
        }
        Ok(())
    }
}

fn validate_percent(percent: u8) -> Result<()> {
    if percent > 100 {
        return Err(Error::Validation(format!(
            "completion percent must be 0..=100, got {percent}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            name: "Migration".into(),
            assignees: vec!["Иванов".into()],
            percent: 10,
            description: "Move mail server".into(),
            planned_date: NaiveDate::from_ymd_opt(2025, 3, 1),
            actual_date: None,
            status: ProjectStatus::InProgress,
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_duration_days() {
        let mut p = project();
        assert_eq!(p.duration_days(), None);
        p.actual_date = NaiveDate::from_ymd_opt(2025, 1, 31);
        assert_eq!(p.duration_days(), Some(30));
    }

    #[test]
    fn test_new_project_validation() {
        let mut np = NewProject {
            name: "  ".into(),
            ..Default::default()
        };
        assert!(np.validate().is_err());
        np.name = "Backup".into();
        np.percent = 101;
        assert!(np.validate().is_err());
        np.percent = 100;
        assert!(np.validate().is_ok());
    }

    #[test]
    fn test_update_apply_is_partial() {
        let mut p = project();
        let update = ProjectUpdate {
            percent: Some(60),
            ..Default::default()
        };
        update.apply(&mut p).unwrap();
        assert_eq!(p.percent, 60);
        assert_eq!(p.description, "Move mail server");
        assert_eq!(p.assignees, vec!["Иванов".to_string()]);

        let bad = ProjectUpdate {
            percent: Some(150),
            ..Default::default()
        };
        assert!(bad.apply(&mut p).is_err());
        assert_eq!(p.percent, 60);
    }

    #[test]
    fn test_notification_fields() {
        let fields = project().notification_fields();
        assert_eq!(fields[0], ("Название".to_string(), "Migration".to_string()));
        assert!(fields.iter().any(|(k, v)| k == "Срок исполнения" && v == "01-03-2025"));
    }
}
