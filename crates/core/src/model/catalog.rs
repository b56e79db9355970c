use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("unknown course: {0}")]
    UnknownCourse(CourseId),

    #[error("course {course} has no module {module}")]
    UnknownModule { course: CourseId, module: ModuleId },
}

/// A single unit of course content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub modules: Vec<Module>,
}

impl Course {
    #[must_use]
    pub fn total_modules(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.iter().find(|module| module.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: ModuleId) -> bool {
        self.module(id).is_some()
    }
}

/// Display state of a module on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Locked,
    Unlocked,
    Completed,
}

impl ModuleState {
    /// Module 1 is always open; module `n` opens once `n - 1` is completed.
    #[must_use]
    pub fn for_module(id: ModuleId, completed: &BTreeSet<ModuleId>) -> Self {
        if completed.contains(&id) {
            return ModuleState::Completed;
        }
        match id.previous() {
            None => ModuleState::Unlocked,
            Some(prev) if completed.contains(&prev) => ModuleState::Unlocked,
            Some(_) => ModuleState::Locked,
        }
    }
}

/// The set of courses offered on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseCatalog {
    courses: Vec<Course>,
}

impl CourseCatalog {
    #[must_use]
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }

    /// The courses shipped with the dashboard.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![
            builtin_course(
                "digital-marketing",
                "Digital Marketing",
                &[
                    "Introduction to Digital Marketing",
                    "Social Media Marketing",
                    "Content Creation",
                    "Measuring Results",
                ],
            ),
            builtin_course(
                "graphic-design",
                "Graphic Design",
                &["Design Basics", "Colour and Typography", "Branding with Canva"],
            ),
            builtin_course(
                "web-development",
                "Web Development",
                &[
                    "How the Web Works",
                    "HTML Foundations",
                    "Styling with CSS",
                    "JavaScript Basics",
                    "Publishing Your Site",
                ],
            ),
        ])
    }

    #[must_use]
    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    /// # Errors
    ///
    /// Returns `CatalogError::UnknownCourse` if the course is not offered.
    pub fn course(&self, id: &CourseId) -> Result<&Course, CatalogError> {
        self.courses
            .iter()
            .find(|course| &course.id == id)
            .ok_or_else(|| CatalogError::UnknownCourse(id.clone()))
    }

    /// # Errors
    ///
    /// Returns `CatalogError` if the course or module does not exist.
    pub fn module(&self, course: &CourseId, module: ModuleId) -> Result<&Module, CatalogError> {
        self.course(course)?
            .module(module)
            .ok_or_else(|| CatalogError::UnknownModule {
                course: course.clone(),
                module,
            })
    }

    /// Pair every module of a course with its lock/completion state.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownCourse` if the course is not offered.
    pub fn module_states(
        &self,
        course: &CourseId,
        completed: &BTreeSet<ModuleId>,
    ) -> Result<Vec<(Module, ModuleState)>, CatalogError> {
        let course = self.course(course)?;
        Ok(course
            .modules
            .iter()
            .map(|module| (module.clone(), ModuleState::for_module(module.id, completed)))
            .collect())
    }
}

impl Default for CourseCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_course(id: &'static str, title: &str, modules: &[&str]) -> Course {
    Course {
        id: CourseId::from_static(id),
        title: title.to_string(),
        modules: (1_u32..)
            .zip(modules)
            .map(|(n, title)| Module {
                id: ModuleId::from_static(n),
                title: (*title).to_string(),
            })
            .collect(),
    }
}
