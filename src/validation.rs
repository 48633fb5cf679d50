//! Input validation for timetabling runs.
//!
//! Checks structural integrity of classes, teachers, assignments, and
//! constraints before generation. Detects:
//! - Duplicate IDs
//! - Assignments referencing unknown classes, subjects, or teachers
//! - Zero weekly-hour quotas
//! - Mutually contradictory constraints
//!
//! Contradictory constraints are disabled in place with a warning
//! rather than blocking the whole run; everything else is collected
//! into a single error list.

use std::collections::HashSet;

use log::warn;

use crate::error::TimetableError;
use crate::models::{Class, Constraint, ConstraintRule, ConstraintScope, SlotFilter, Teacher, TeacherAssignment};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// An assignment references a class that doesn't exist.
    UnknownClassReference,
    /// An assignment references a subject its class doesn't teach.
    UnknownSubjectReference,
    /// An assignment references a teacher that doesn't exist.
    UnknownTeacherReference,
    /// A subject demands zero weekly hours.
    ZeroWeeklyHours,
    /// A Forbidden/Required constraint restricts no day and no period.
    UnboundedSlotRule,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates the input data for a generation run.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(
    classes: &[Class],
    teachers: &[Teacher],
    assignments: &[TeacherAssignment],
    constraints: &[Constraint],
) -> ValidationResult {
    let mut errors = Vec::new();

    let mut teacher_ids = HashSet::new();
    for t in teachers {
        if !teacher_ids.insert(t.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate teacher ID: {}", t.id),
            ));
        }
    }

    let mut class_ids = HashSet::new();
    for class in classes {
        if !class_ids.insert(class.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate class ID: {}", class.id),
            ));
        }

        let mut subject_ids = HashSet::new();
        for req in &class.subjects {
            if !subject_ids.insert(req.subject_id.as_str()) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::DuplicateId,
                    format!(
                        "Class '{}' lists subject '{}' twice",
                        class.id, req.subject_id
                    ),
                ));
            }
            if req.weekly_hours == 0 {
                errors.push(ValidationError::new(
                    ValidationErrorKind::ZeroWeeklyHours,
                    format!(
                        "Class '{}' subject '{}' has zero weekly hours",
                        class.id, req.subject_id
                    ),
                ));
            }
        }
    }

    for a in assignments {
        match classes.iter().find(|c| c.id == a.class_id) {
            None => errors.push(ValidationError::new(
                ValidationErrorKind::UnknownClassReference,
                format!("Assignment references unknown class '{}'", a.class_id),
            )),
            Some(class) => {
                if !class.has_subject(&a.subject_id) {
                    errors.push(ValidationError::new(
                        ValidationErrorKind::UnknownSubjectReference,
                        format!(
                            "Assignment references subject '{}' not taught in class '{}'",
                            a.subject_id, a.class_id
                        ),
                    ));
                }
            }
        }
        if !teacher_ids.contains(a.teacher_id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnknownTeacherReference,
                format!("Assignment references unknown teacher '{}'", a.teacher_id),
            ));
        }
    }

    let mut constraint_ids = HashSet::new();
    for c in constraints {
        if !constraint_ids.insert(c.id.as_str()) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate constraint ID: {}", c.id),
            ));
        }
        if matches!(c.rule, ConstraintRule::Forbidden | ConstraintRule::Required)
            && c.slot.is_empty()
        {
            errors.push(ValidationError::new(
                ValidationErrorKind::UnboundedSlotRule,
                format!("Constraint '{}' restricts neither day nor period", c.id),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Detects mutually contradictory constraints and disables them.
///
/// A Required and a Forbidden constraint contradict when their scopes
/// can match the same entry and their slot filters intersect — including
/// overlapping-but-not-identical scopes, where neither side can be
/// silently favored. A MinConsecutive(k) likewise contradicts a
/// MaxConsecutive(j) with k > j over an overlapping scope.
///
/// Offenders are disabled in place (not removed) with a warning, and one
/// [`TimetableError::ConstraintUnsatisfiable`] is returned per pair so
/// callers can flag both for manual review.
pub fn validate_constraints(constraints: &mut [Constraint]) -> Vec<TimetableError> {
    let mut findings = Vec::new();

    for i in 0..constraints.len() {
        for j in (i + 1)..constraints.len() {
            if !constraints[i].enabled || !constraints[j].enabled {
                continue;
            }
            let contradiction = match (&constraints[i].rule, &constraints[j].rule) {
                (ConstraintRule::Required, ConstraintRule::Forbidden)
                | (ConstraintRule::Forbidden, ConstraintRule::Required) => {
                    scopes_overlap(&constraints[i].scope, &constraints[j].scope)
                        && filters_intersect(&constraints[i].slot, &constraints[j].slot)
                }
                (ConstraintRule::MinConsecutive(k), ConstraintRule::MaxConsecutive(m))
                | (ConstraintRule::MaxConsecutive(m), ConstraintRule::MinConsecutive(k)) => {
                    k > m && scopes_overlap(&constraints[i].scope, &constraints[j].scope)
                }
                _ => false,
            };

            if contradiction {
                let ids = vec![constraints[i].id.clone(), constraints[j].id.clone()];
                warn!(
                    "constraints {} and {} are mutually unsatisfiable; both disabled",
                    ids[0], ids[1]
                );
                constraints[i].enabled = false;
                constraints[j].enabled = false;
                findings.push(TimetableError::ConstraintUnsatisfiable { ids });
            }
        }
    }

    findings
}

/// Whether two scopes can match the same entry: every field is either
/// unset on one side or equal.
fn scopes_overlap(a: &ConstraintScope, b: &ConstraintScope) -> bool {
    fields_compatible(a.class_id.as_deref(), b.class_id.as_deref())
        && fields_compatible(a.subject_id.as_deref(), b.subject_id.as_deref())
        && fields_compatible(a.teacher_id.as_deref(), b.teacher_id.as_deref())
}

fn filters_intersect(a: &SlotFilter, b: &SlotFilter) -> bool {
    a.day.zip(b.day).is_none_or(|(x, y)| x == y)
        && a.period.zip(b.period).is_none_or(|(x, y)| x == y)
}

fn fields_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}
