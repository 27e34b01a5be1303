//! Structural invariants of an instruction document
//!
//! - grouped id arrays equal the set of children back-referencing the parent
//! - `Substep.step_order` is dense 1..N within a step
//! - every video has exactly one viewport keyframe at frame 0
//! - video sections are non-empty and never overlap within a video

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{ChildList, EntityRow, Instruction, KindVisitor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Parent array lists an id that does not exist or points elsewhere.
    DanglingChildId { list: ChildList, parent_id: String, child_id: String },
    /// Child references a parent whose array does not list it.
    MissingChildId { list: ChildList, parent_id: String, child_id: String },
    /// Child references a parent that does not exist.
    MissingParent { list: ChildList, parent_id: String, child_id: String },
    DuplicateChildId { list: ChildList, parent_id: String, child_id: String },
    SparseStepOrder { step_id: String, orders: Vec<u32> },
    InitialKeyframeCount { video_id: String, count: usize },
    EmptySection { section_id: String },
    OverlappingSections { first: String, second: String },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DanglingChildId { list, parent_id, child_id } => write!(
                f,
                "{} of {parent_id} lists {child_id}, which does not point back",
                list.field_name()
            ),
            Self::MissingChildId { list, parent_id, child_id } => write!(
                f,
                "{child_id} points at {parent_id} but is missing from its {}",
                list.field_name()
            ),
            Self::MissingParent { list, parent_id, child_id } => write!(
                f,
                "{child_id} points at missing {} {parent_id}",
                list.parent_kind()
            ),
            Self::DuplicateChildId { list, parent_id, child_id } => write!(
                f,
                "{} of {parent_id} lists {child_id} more than once",
                list.field_name()
            ),
            Self::SparseStepOrder { step_id, orders } => {
                write!(f, "substep orders of step {step_id} are not dense: {orders:?}")
            }
            Self::InitialKeyframeCount { video_id, count } => write!(
                f,
                "video {video_id} has {count} viewport keyframes at frame 0 (expected 1)"
            ),
            Self::EmptySection { section_id } => write!(f, "video section {section_id} is empty"),
            Self::OverlappingSections { first, second } => {
                write!(f, "video sections {first} and {second} overlap")
            }
        }
    }
}

/// Check every structural invariant; an empty result means the document is consistent.
pub fn check_integrity(doc: &Instruction) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();

    for list in ChildList::ALL {
        check_child_list(doc, list, &mut violations);
    }

    check_step_orders(doc, &mut violations);
    check_keyframes(doc, &mut violations);
    check_sections(doc, &mut violations);

    violations
}

/// Collects `(parent_id, child_id)` for every child row in `list`.
struct BackRefs<'a> {
    doc: &'a Instruction,
    list: ChildList,
}

impl KindVisitor for BackRefs<'_> {
    type Output = Vec<(String, String)>;

    fn visit<R: EntityRow>(self) -> Self::Output {
        R::table(self.doc)
            .values()
            .filter_map(|row| match row.parent() {
                Some((list, parent_id)) if list == self.list => {
                    Some((parent_id.to_string(), row.id().to_string()))
                }
                _ => None,
            })
            .collect()
    }
}

fn check_child_list(doc: &Instruction, list: ChildList, out: &mut Vec<IntegrityViolation>) {
    let mut expected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for (parent_id, child_id) in list.child_kind().visit(BackRefs { doc, list }) {
        if doc.contains(list.parent_kind(), &parent_id) {
            expected.entry(parent_id).or_default().insert(child_id);
        } else {
            out.push(IntegrityViolation::MissingParent { list, parent_id, child_id });
        }
    }

    for parent_id in parent_ids(doc, list) {
        let actual = doc.child_ids(list, &parent_id).cloned().unwrap_or_default();
        let wanted = expected.remove(&parent_id).unwrap_or_default();

        let mut seen = BTreeSet::new();
        for child_id in &actual {
            if !seen.insert(child_id.clone()) {
                out.push(IntegrityViolation::DuplicateChildId {
                    list,
                    parent_id: parent_id.clone(),
                    child_id: child_id.clone(),
                });
            } else if !wanted.contains(child_id) {
                out.push(IntegrityViolation::DanglingChildId {
                    list,
                    parent_id: parent_id.clone(),
                    child_id: child_id.clone(),
                });
            }
        }

        for child_id in wanted.difference(&seen) {
            out.push(IntegrityViolation::MissingChildId {
                list,
                parent_id: parent_id.clone(),
                child_id: child_id.clone(),
            });
        }
    }
}

fn parent_ids(doc: &Instruction, list: ChildList) -> Vec<String> {
    match list {
        ChildList::AssemblySteps => doc.assemblies.keys().cloned().collect(),
        ChildList::StepSubsteps => doc.steps.keys().cloned().collect(),
        ChildList::VideoSections
        | ChildList::VideoFrameAreas
        | ChildList::VideoViewportKeyframes => doc.videos.keys().cloned().collect(),
        _ => doc.substeps.keys().cloned().collect(),
    }
}

/// Rewrite every grouped id array to match the children's back-references.
///
/// Ids that still belong keep their position, stale and duplicate ids are
/// dropped, and missing children are appended in id order. Returns the number
/// of arrays that changed.
pub fn reconcile_child_lists(doc: &mut Instruction) -> usize {
    let mut rewritten = 0;

    for list in ChildList::ALL {
        let mut expected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (parent_id, child_id) in list.child_kind().visit(BackRefs { doc: &*doc, list }) {
            expected.entry(parent_id).or_default().insert(child_id);
        }

        for parent_id in parent_ids(doc, list) {
            let wanted = expected.remove(&parent_id).unwrap_or_default();
            let Some(ids) = doc.child_ids_mut(list, &parent_id) else {
                continue;
            };

            let mut seen = BTreeSet::new();
            let mut next: Vec<String> = ids
                .iter()
                .filter(|id| wanted.contains(*id) && seen.insert((*id).clone()))
                .cloned()
                .collect();
            next.extend(wanted.difference(&seen).cloned());

            if *ids != next {
                *ids = next;
                rewritten += 1;
            }
        }
    }

    rewritten
}

fn check_step_orders(doc: &Instruction, out: &mut Vec<IntegrityViolation>) {
    for step_id in doc.steps.keys() {
        let orders: Vec<u32> = doc
            .substeps_of_step(step_id)
            .iter()
            .map(|s| s.step_order)
            .collect();

        let dense = orders.iter().enumerate().all(|(i, order)| *order as usize == i + 1);
        if !dense {
            out.push(IntegrityViolation::SparseStepOrder {
                step_id: step_id.clone(),
                orders,
            });
        }
    }
}

fn check_keyframes(doc: &Instruction, out: &mut Vec<IntegrityViolation>) {
    for video_id in doc.videos.keys() {
        let count = doc
            .keyframes_of_video(video_id)
            .filter(|k| k.frame_number == 0)
            .count();
        if count != 1 {
            out.push(IntegrityViolation::InitialKeyframeCount {
                video_id: video_id.clone(),
                count,
            });
        }
    }
}

fn check_sections(doc: &Instruction, out: &mut Vec<IntegrityViolation>) {
    for video_id in doc.videos.keys() {
        let mut sections: Vec<_> = doc.sections_of_video(video_id).collect();
        sections.sort_by_key(|s| (s.start_frame, s.end_frame));

        for section in &sections {
            if section.start_frame > section.end_frame {
                out.push(IntegrityViolation::EmptySection {
                    section_id: section.id.clone(),
                });
            }
        }

        for pair in sections.windows(2) {
            if pair[0].overlaps(pair[1]) {
                out.push(IntegrityViolation::OverlappingSections {
                    first: pair[0].id.clone(),
                    second: pair[1].id.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Assembly, Step, Substep, Video, VideoSection, ViewportKeyframe};

    fn consistent_doc() -> Instruction {
        let mut doc = Instruction::default();
        doc.assemblies.insert(
            "a1".into(),
            Assembly { id: "a1".into(), step_ids: vec!["s1".into()], ..Default::default() },
        );
        doc.steps.insert(
            "s1".into(),
            Step {
                id: "s1".into(),
                assembly_id: Some("a1".into()),
                substep_ids: vec!["ss1".into(), "ss2".into()],
                ..Default::default()
            },
        );
        for (id, order) in [("ss1", 1), ("ss2", 2)] {
            doc.substeps.insert(
                id.into(),
                Substep {
                    id: id.into(),
                    step_id: Some("s1".into()),
                    step_order: order,
                    ..Default::default()
                },
            );
        }
        doc.videos.insert(
            "v1".into(),
            Video {
                id: "v1".into(),
                viewport_keyframe_ids: vec!["k0".into()],
                ..Default::default()
            },
        );
        doc.viewport_keyframes
            .insert("k0".into(), ViewportKeyframe::initial("k0", "v1"));
        doc
    }

    #[test]
    fn test_consistent_document_has_no_violations() {
        assert!(check_integrity(&consistent_doc()).is_empty());
    }

    #[test]
    fn test_detects_dangling_and_missing_ids() {
        let mut doc = consistent_doc();
        doc.assemblies.get_mut("a1").unwrap().step_ids = vec!["ghost".into()];

        let violations = check_integrity(&doc);
        assert!(violations.contains(&IntegrityViolation::DanglingChildId {
            list: ChildList::AssemblySteps,
            parent_id: "a1".into(),
            child_id: "ghost".into(),
        }));
        assert!(violations.contains(&IntegrityViolation::MissingChildId {
            list: ChildList::AssemblySteps,
            parent_id: "a1".into(),
            child_id: "s1".into(),
        }));
    }

    #[test]
    fn test_reconcile_repairs_child_lists() {
        let mut doc = consistent_doc();
        doc.steps.get_mut("s1").unwrap().substep_ids = vec!["ss2".into(), "ghost".into(), "ss2".into()];
        doc.assemblies.get_mut("a1").unwrap().step_ids.clear();

        assert_eq!(reconcile_child_lists(&mut doc), 2);
        assert_eq!(doc.steps["s1"].substep_ids, vec!["ss2".to_string(), "ss1".to_string()]);
        assert_eq!(doc.assemblies["a1"].step_ids, vec!["s1".to_string()]);
        assert!(check_integrity(&doc).is_empty());

        assert_eq!(reconcile_child_lists(&mut doc), 0);
    }

    #[test]
    fn test_detects_sparse_step_order() {
        let mut doc = consistent_doc();
        doc.substeps.get_mut("ss2").unwrap().step_order = 3;

        assert_eq!(
            check_integrity(&doc),
            vec![IntegrityViolation::SparseStepOrder { step_id: "s1".into(), orders: vec![1, 3] }]
        );
    }

    #[test]
    fn test_detects_missing_initial_keyframe_and_overlap() {
        let mut doc = consistent_doc();
        doc.viewport_keyframes.get_mut("k0").unwrap().frame_number = 5;
        for (id, start, end) in [("sec1", 0, 10), ("sec2", 10, 20)] {
            doc.video_sections.insert(
                id.into(),
                VideoSection {
                    id: id.into(),
                    video_id: "v1".into(),
                    start_frame: start,
                    end_frame: end,
                    title: None,
                },
            );
        }
        doc.videos.get_mut("v1").unwrap().section_ids = vec!["sec1".into(), "sec2".into()];

        let violations = check_integrity(&doc);
        assert!(violations.contains(&IntegrityViolation::InitialKeyframeCount {
            video_id: "v1".into(),
            count: 0,
        }));
        assert!(violations.contains(&IntegrityViolation::OverlappingSections {
            first: "sec1".into(),
            second: "sec2".into(),
        }));
    }
}
