//! Per-kind admission rules for inserts and updates
//!
//! Generic mutation code asks a row whether it may enter the document; rows
//! with invariants of their own (substep ordering, section ranges, the
//! frame-0 viewport) answer here.

use instruct_model::*;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    #[error("row already exists")]
    DuplicateId,

    #[error("parent {0} does not exist")]
    MissingParent(String),

    #[error("section range [{start}, {end}] is empty")]
    EmptyRange { start: u32, end: u32 },

    #[error("section range overlaps sibling {0}")]
    OverlappingSection(String),

    #[error("video already has a viewport keyframe at frame 0")]
    DuplicateInitialKeyframe,

    #[error("the frame-0 viewport keyframe cannot leave frame 0")]
    InitialKeyframeFixed,
}

pub trait StoreRow: EntityRow {
    /// Adjust and validate a row about to be inserted.
    fn prepare_insert(&mut self, _doc: &Instruction) -> Result<(), Refusal> {
        Ok(())
    }

    /// Validate an edited row against the stored `original`.
    fn validate_update(&self, _original: &Self, _doc: &Instruction) -> Result<(), Refusal> {
        Ok(())
    }
}

impl StoreRow for Assembly {}
impl StoreRow for Step {}
impl StoreRow for SubstepImage {}
impl StoreRow for SubstepDescription {}
impl StoreRow for SubstepPartTool {}
impl StoreRow for SubstepNote {}
impl StoreRow for SubstepTutorial {}
impl StoreRow for SubstepVideoSection {}
impl StoreRow for Video {}
impl StoreRow for VideoFrameArea {}
impl StoreRow for PartTool {}
impl StoreRow for Note {}
impl StoreRow for SafetyIcon {}
impl StoreRow for Drawing {}
impl StoreRow for PartToolVideoFrameArea {}

impl StoreRow for Substep {
    fn prepare_insert(&mut self, doc: &Instruction) -> Result<(), Refusal> {
        self.step_order = match &self.step_id {
            Some(step_id) => next_step_order(doc, step_id),
            None => 0,
        };
        Ok(())
    }
}

/// `max(step_order) + 1` among the substeps of `step_id`.
pub(crate) fn next_step_order(doc: &Instruction, step_id: &str) -> u32 {
    doc.substeps
        .values()
        .filter(|s| s.step_id.as_deref() == Some(step_id))
        .map(|s| s.step_order)
        .max()
        .map_or(1, |max| max.saturating_add(1))
}

impl StoreRow for VideoSection {
    fn prepare_insert(&mut self, doc: &Instruction) -> Result<(), Refusal> {
        check_section_range(self, doc)
    }

    fn validate_update(&self, _original: &Self, doc: &Instruction) -> Result<(), Refusal> {
        check_section_range(self, doc)
    }
}

fn check_section_range(section: &VideoSection, doc: &Instruction) -> Result<(), Refusal> {
    if section.start_frame > section.end_frame {
        return Err(Refusal::EmptyRange {
            start: section.start_frame,
            end: section.end_frame,
        });
    }

    match doc
        .sections_of_video(&section.video_id)
        .find(|sibling| sibling.id != section.id && sibling.overlaps(section))
    {
        Some(sibling) => Err(Refusal::OverlappingSection(sibling.id.clone())),
        None => Ok(()),
    }
}

impl StoreRow for ViewportKeyframe {
    fn prepare_insert(&mut self, doc: &Instruction) -> Result<(), Refusal> {
        if self.frame_number == 0 && has_initial_keyframe(doc, &self.video_id) {
            return Err(Refusal::DuplicateInitialKeyframe);
        }
        Ok(())
    }

    fn validate_update(&self, original: &Self, doc: &Instruction) -> Result<(), Refusal> {
        if original.frame_number == 0 && self.frame_number != 0 {
            return Err(Refusal::InitialKeyframeFixed);
        }
        if original.frame_number != 0
            && self.frame_number == 0
            && has_initial_keyframe(doc, &self.video_id)
        {
            return Err(Refusal::DuplicateInitialKeyframe);
        }
        Ok(())
    }
}

fn has_initial_keyframe(doc: &Instruction, video_id: &str) -> bool {
    doc.keyframes_of_video(video_id).any(|k| k.frame_number == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: &str, start: u32, end: u32) -> VideoSection {
        VideoSection {
            id: id.into(),
            video_id: "v1".into(),
            start_frame: start,
            end_frame: end,
            title: None,
        }
    }

    #[test]
    fn test_section_range_rules() {
        let mut doc = Instruction::default();
        doc.video_sections.insert("a".into(), section("a", 0, 10));

        assert_eq!(
            section("b", 5, 3).prepare_insert(&doc),
            Err(Refusal::EmptyRange { start: 5, end: 3 })
        );
        assert_eq!(
            section("b", 10, 12).prepare_insert(&doc),
            Err(Refusal::OverlappingSection("a".into()))
        );
        assert_eq!(section("b", 11, 12).prepare_insert(&doc), Ok(()));
        // Updating a section against itself is not an overlap.
        assert_eq!(section("a", 0, 5).validate_update(&section("a", 0, 10), &doc), Ok(()));
    }

    #[test]
    fn test_next_step_order_saturates() {
        let mut doc = Instruction::default();
        assert_eq!(next_step_order(&doc, "s1"), 1);

        doc.substeps.insert(
            "ss1".into(),
            Substep {
                id: "ss1".into(),
                step_id: Some("s1".into()),
                step_order: u32::MAX,
                ..Default::default()
            },
        );
        assert_eq!(next_step_order(&doc, "s1"), u32::MAX);
    }

    #[test]
    fn test_next_step_order() {
        let mut doc = Instruction::default();
        assert_eq!(next_step_order(&doc, "s1"), 1);

        doc.substeps.insert(
            "ss1".into(),
            Substep { id: "ss1".into(), step_id: Some("s1".into()), step_order: 4, ..Default::default() },
        );
        assert_eq!(next_step_order(&doc, "s1"), 5);
    }
}
