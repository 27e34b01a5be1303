//! # Instruction Document
//!
//! The whole in-memory object graph of one project: singleton fields plus one
//! `id → row` dictionary per entity kind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::rows::*;
use crate::{ChildList, EntityKind, KindVisitor, ModelError};

/// Singleton document fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionMeta {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preview_image_id: Option<String>,
    #[serde(default)]
    pub cover_image_area_id: Option<String>,
    #[serde(default)]
    pub article_number: Option<String>,
    /// Estimated duration in minutes.
    #[serde(default)]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub source_language: Option<String>,
    #[serde(default)]
    pub current_version_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instruction {
    #[serde(default)]
    pub instruction: InstructionMeta,
    #[serde(default)]
    pub assemblies: BTreeMap<String, Assembly>,
    #[serde(default)]
    pub steps: BTreeMap<String, Step>,
    #[serde(default)]
    pub substeps: BTreeMap<String, Substep>,
    #[serde(default)]
    pub substep_images: BTreeMap<String, SubstepImage>,
    #[serde(default)]
    pub substep_descriptions: BTreeMap<String, SubstepDescription>,
    #[serde(default)]
    pub substep_part_tools: BTreeMap<String, SubstepPartTool>,
    #[serde(default)]
    pub substep_notes: BTreeMap<String, SubstepNote>,
    #[serde(default)]
    pub substep_tutorials: BTreeMap<String, SubstepTutorial>,
    #[serde(default)]
    pub substep_video_sections: BTreeMap<String, SubstepVideoSection>,
    #[serde(default)]
    pub videos: BTreeMap<String, Video>,
    #[serde(default)]
    pub video_sections: BTreeMap<String, VideoSection>,
    #[serde(default)]
    pub video_frame_areas: BTreeMap<String, VideoFrameArea>,
    #[serde(default)]
    pub viewport_keyframes: BTreeMap<String, ViewportKeyframe>,
    #[serde(default)]
    pub part_tools: BTreeMap<String, PartTool>,
    #[serde(default)]
    pub notes: BTreeMap<String, Note>,
    #[serde(default)]
    pub safety_icons: BTreeMap<String, SafetyIcon>,
    #[serde(default)]
    pub drawings: BTreeMap<String, Drawing>,
    #[serde(default)]
    pub part_tool_video_frame_areas: BTreeMap<String, PartToolVideoFrameArea>,
}

impl Instruction {
    pub fn new(meta: InstructionMeta) -> Self {
        Self {
            instruction: meta,
            ..Default::default()
        }
    }

    pub fn from_json(source: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json(&source)
    }

    pub fn to_json_pretty(&self) -> Result<String, ModelError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn get<R: EntityRow>(&self, id: &str) -> Option<&R> {
        R::table(self).get(id)
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        struct Contains<'a> {
            doc: &'a Instruction,
            id: &'a str,
        }

        impl KindVisitor for Contains<'_> {
            type Output = bool;

            fn visit<R: EntityRow>(self) -> bool {
                R::table(self.doc).contains_key(self.id)
            }
        }

        kind.visit(Contains { doc: self, id })
    }

    /// Number of rows across every table.
    pub fn row_count(&self) -> usize {
        struct Count<'a>(&'a Instruction);

        impl KindVisitor for Count<'_> {
            type Output = usize;

            fn visit<R: EntityRow>(self) -> usize {
                R::table(self.0).len()
            }
        }

        EntityKind::ALL.iter().map(|kind| kind.visit(Count(self))).sum()
    }

    /// Grouped id array for `list` on the parent row `parent_id`.
    pub fn child_ids(&self, list: ChildList, parent_id: &str) -> Option<&Vec<String>> {
        match list {
            ChildList::AssemblySteps => self.assemblies.get(parent_id).map(|a| &a.step_ids),
            ChildList::StepSubsteps => self.steps.get(parent_id).map(|s| &s.substep_ids),
            ChildList::VideoSections
            | ChildList::VideoFrameAreas
            | ChildList::VideoViewportKeyframes => {
                self.videos.get(parent_id).and_then(|v| v.child_ids(list))
            }
            _ => self
                .substeps
                .get(parent_id)
                .and_then(|s| s.element_ids(list)),
        }
    }

    pub fn child_ids_mut(&mut self, list: ChildList, parent_id: &str) -> Option<&mut Vec<String>> {
        match list {
            ChildList::AssemblySteps => self
                .assemblies
                .get_mut(parent_id)
                .map(|a| &mut a.step_ids),
            ChildList::StepSubsteps => self.steps.get_mut(parent_id).map(|s| &mut s.substep_ids),
            ChildList::VideoSections
            | ChildList::VideoFrameAreas
            | ChildList::VideoViewportKeyframes => self
                .videos
                .get_mut(parent_id)
                .and_then(|v| v.child_ids_mut(list)),
            _ => self
                .substeps
                .get_mut(parent_id)
                .and_then(|s| s.element_ids_mut(list)),
        }
    }

    /// Substeps currently assigned to `step_id`, in `step_order`.
    pub fn substeps_of_step(&self, step_id: &str) -> Vec<&Substep> {
        let mut siblings: Vec<&Substep> = self
            .substeps
            .values()
            .filter(|s| s.step_id.as_deref() == Some(step_id))
            .collect();
        siblings.sort_by_key(|s| s.step_order);
        siblings
    }

    pub fn sections_of_video(&self, video_id: &str) -> impl Iterator<Item = &VideoSection> {
        let video_id = video_id.to_string();
        self.video_sections
            .values()
            .filter(move |s| s.video_id == video_id)
    }

    pub fn keyframes_of_video(&self, video_id: &str) -> impl Iterator<Item = &ViewportKeyframe> {
        let video_id = video_id.to_string();
        self.viewport_keyframes
            .values()
            .filter(move |k| k.video_id == video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let json = r#"{
            "instruction": { "id": "i1", "name": "Coffee machine" },
            "assemblies": {
                "a1": { "id": "a1", "title": "Frame", "stepIds": ["s1"] }
            },
            "steps": {
                "s1": { "id": "s1", "assemblyId": "a1", "title": "Mount" }
            }
        }"#;

        let doc = Instruction::from_json(json).unwrap();
        assert_eq!(doc.instruction.name, "Coffee machine");
        assert_eq!(doc.steps["s1"].repeat_count, 1);
        assert_eq!(
            doc.child_ids(ChildList::AssemblySteps, "a1"),
            Some(&vec!["s1".to_string()])
        );
        assert!(doc.contains(EntityKind::Step, "s1"));
        assert!(!doc.contains(EntityKind::Substep, "s1"));
        assert_eq!(doc.row_count(), 2);
    }

    #[test]
    fn test_rejects_malformed_json() {
        let result = Instruction::from_json("{ \"steps\": [] }");
        assert!(matches!(result, Err(ModelError::Json(_))));
    }
}
