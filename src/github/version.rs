//! GitHub version planning: semver-like tag parsing and the series/major
//! helpers the orchestrator uses to build a sync plan (spec §4.3).

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemverTag {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

/// Parse a tag like `v16.2.0` or `16.2.0` into its numeric components.
/// Returns `None` for anything that doesn't look like semver (`main`,
/// `latest`, `release-candidate-1`, ...).
pub fn parse_semver_tag(tag: &str) -> Option<(SemverTag, &str)> {
    let trimmed = tag.strip_prefix('v').unwrap_or(tag);
    let mut parts = trimmed.splitn(3, '.');
    let major: u64 = parts.next()?.parse().ok()?;
    let minor: u64 = parts.next().unwrap_or("0").parse().ok()?;
    let patch_raw = parts.next().unwrap_or("0");
    // allow trailing pre-release/build metadata like "0-rc.1"
    let patch_digits: String = patch_raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    let patch: u64 = if patch_digits.is_empty() {
        0
    } else {
        patch_digits.parse().ok()?
    };
    Some((SemverTag { major, minor, patch }, tag))
}

/// A series label like `"16.x"`, or `None` for non-numeric refs (`main`).
pub fn parse_series_label(label: &str) -> Option<u64> {
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || !label.ends_with(".x") {
        return None;
    }
    digits.parse().ok()
}

/// `extractMajorVersion("v16.2.3") = "16.x"`.
pub fn extract_major_version(tag: &str) -> Option<String> {
    parse_semver_tag(tag).map(|(v, _)| format!("{}.x", v.major))
}

/// The overall highest semver tag (used when no explicit label is given).
pub fn pick_default_version<'a>(tags: &[&'a str]) -> Option<&'a str> {
    tags.iter()
        .filter_map(|t| parse_semver_tag(t))
        .max_by_key(|(v, _)| *v)
        .map(|(_, original)| original)
}

/// The highest tag within a `"N.x"` series.
pub fn pick_latest_for_series<'a>(tags: &[&'a str], series_label: &str) -> Option<&'a str> {
    let major = parse_series_label(series_label)?;
    tags.iter()
        .filter_map(|t| parse_semver_tag(t))
        .filter(|(v, _)| v.major == major)
        .max_by_key(|(v, _)| *v)
        .map(|(_, original)| original)
}

/// Map each major version present in `tags` to its highest tag.
pub fn get_latest_tag_by_major<'a>(tags: &[&'a str]) -> Vec<(u64, &'a str)> {
    use std::collections::HashMap;
    let mut by_major: HashMap<u64, (SemverTag, &str)> = HashMap::new();
    for tag in tags {
        if let Some((v, original)) = parse_semver_tag(tag) {
            by_major
                .entry(v.major)
                .and_modify(|existing| {
                    if v > existing.0 {
                        *existing = (v, original);
                    }
                })
                .or_insert((v, original));
        }
    }
    let mut out: Vec<(u64, &str)> = by_major
        .into_iter()
        .map(|(major, (_, tag))| (major, tag))
        .collect();
    out.sort_by(|a, b| b.0.cmp(&a.0));
    out
}

/// One entry of the orchestrator's version sync plan: a version label and
/// the ref it resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub version_label: String,
    pub git_ref: String,
}

/// Build the plan of labels to sync: prior labels known in `source_versions`,
/// the source's declared label, and the top `max_majors` majors from tags
/// (spec §4.3 "Versioning").
pub fn build_version_plan(
    known_labels: &[String],
    declared_label: Option<&str>,
    declared_ref: &str,
    default_branch: &str,
    tags: &[&str],
    max_majors: usize,
) -> Vec<PlanEntry> {
    let mut labels: Vec<String> = known_labels.to_vec();
    if let Some(label) = declared_label {
        if !labels.contains(&label.to_string()) {
            labels.push(label.to_string());
        }
    }

    let top_majors = get_latest_tag_by_major(tags);
    for (major, _) in top_majors.iter().take(max_majors) {
        let label = format!("{major}.x");
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    labels
        .into_iter()
        .map(|label| {
            let git_ref = pick_latest_for_series(tags, &label)
                .map(|t| t.to_string())
                .unwrap_or_else(|| {
                    if Some(label.as_str()) == declared_label {
                        declared_ref.to_string()
                    } else {
                        default_branch.to_string()
                    }
                });
            PlanEntry {
                version_label: label,
                git_ref,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_planning_literal_scenario() {
        let tags = vec!["v16.2.0", "v16.1.0", "v15.9.9"];
        assert_eq!(pick_latest_for_series(&tags, "16.x"), Some("v16.2.0"));
        assert_eq!(extract_major_version("v16.2.3").as_deref(), Some("16.x"));
        assert_eq!(parse_series_label("main"), None);
    }

    #[test]
    fn default_version_is_highest_overall() {
        let tags = vec!["v1.0.0", "v2.3.1", "v2.3.0"];
        assert_eq!(pick_default_version(&tags), Some("v2.3.1"));
    }

    #[test]
    fn plan_includes_declared_and_top_majors() {
        let tags = vec!["v3.0.0", "v2.5.0", "v1.9.0"];
        let plan = build_version_plan(&[], Some("main"), "main", "main", &tags, 2);
        let labels: Vec<_> = plan.iter().map(|e| e.version_label.clone()).collect();
        assert!(labels.contains(&"main".to_string()));
        assert!(labels.contains(&"3.x".to_string()));
        assert!(labels.contains(&"2.x".to_string()));
        assert!(!labels.contains(&"1.x".to_string()));
    }
}
