use super::{MeshPart, SceneGraph};
use crate::color::{ColorRole, Colors, Rgb};
use crate::config::MaterialRules;
use std::fmt;
use std::sync::Arc;

/// Color picked for one part by [`apply_colors`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartAssignment {
    pub part: String,
    pub role: ColorRole,
    pub color: Rgb,
    /// Key of the rule that matched, `None` when the part fell back to primary.
    pub matched_rule: Option<String>,
}

/// A part that could not be recolored. Never aborts loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialApplyWarning {
    pub part: String,
    pub reason: String,
}

impl fmt::Display for MaterialApplyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part '{}' not recolored: {}", self.part, self.reason)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorReport {
    pub assignments: Vec<PartAssignment>,
    pub warnings: Vec<MaterialApplyWarning>,
}

impl ColorReport {
    pub fn assignment(&self, part: &str) -> Option<&PartAssignment> {
        self.assignments.iter().find(|entry| entry.part == part)
    }

    pub fn count(&self, role: ColorRole) -> usize {
        self.assignments
            .iter()
            .filter(|entry| entry.role == role)
            .count()
    }
}

/// Lowercased names the rule keys are matched against: material name,
/// part name and mesh name. Empty names are left out.
pub fn comparison_names(part: &MeshPart) -> Vec<String> {
    let material = part.material.as_ref().map(|material| material.name.as_str());
    [material, Some(part.name.as_str()), Some(part.mesh_name.as_str())]
        .into_iter()
        .flatten()
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Role for a part's names: first matching rule, primary otherwise.
pub fn role_for(rules: &MaterialRules, names: &[String]) -> (ColorRole, Option<String>) {
    match rules.first_match(names) {
        Some(rule) => (rule.role, Some(rule.key.clone())),
        None => (ColorRole::Primary, None),
    }
}

/// Recolors every part of `scene` from `colors` according to `rules`.
///
/// Each part's material is made unique before its color changes, so parts
/// that shared a material in the asset no longer affect each other. Only the
/// base color RGB is written; opacity, roughness and the rest stay as loaded.
/// Calling this again with new colors recolors in place.
pub fn apply_colors(scene: &mut SceneGraph, rules: &MaterialRules, colors: &Colors) -> ColorReport {
    let mut report = ColorReport::default();
    for part in &mut scene.parts {
        let names = comparison_names(part);
        let (role, matched_rule) = role_for(rules, &names);
        let color = colors.get(role);

        let Some(material) = part.material.as_mut() else {
            let warning = MaterialApplyWarning {
                part: part.name.clone(),
                reason: "part has no material".to_string(),
            };
            log::warn!("{}", warning);
            report.warnings.push(warning);
            continue;
        };

        Arc::make_mut(material).set_base_rgb(color.to_f32());
        report.assignments.push(PartAssignment {
            part: part.name.clone(),
            role,
            color,
            matched_rule,
        });
    }
    log::debug!(
        "Applied colors to {} part(s): {} primary, {} secondary, {} accent, {} warning(s)",
        report.assignments.len(),
        report.count(ColorRole::Primary),
        report.count(ColorRole::Secondary),
        report.count(ColorRole::Accent),
        report.warnings.len()
    );
    report
}
