//! Entity kinds and the parent → children relation table

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rows::*;
use crate::EntityRow;

/// Every row type stored in an [`crate::Instruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Assembly,
    Step,
    Substep,
    SubstepImage,
    SubstepDescription,
    SubstepPartTool,
    SubstepNote,
    SubstepTutorial,
    SubstepVideoSection,
    Video,
    VideoSection,
    VideoFrameArea,
    ViewportKeyframe,
    PartTool,
    Note,
    SafetyIcon,
    Drawing,
    PartToolVideoFrameArea,
}

/// Calls back with the concrete row type behind an [`EntityKind`].
///
/// This is how kind-agnostic code (diffing, exporting, cascading deletes)
/// reaches typed tables without a runtime-built lookup table.
pub trait KindVisitor {
    type Output;

    fn visit<R: EntityRow>(self) -> Self::Output;
}

impl EntityKind {
    pub const ALL: [EntityKind; 18] = [
        EntityKind::Assembly,
        EntityKind::Step,
        EntityKind::Substep,
        EntityKind::SubstepImage,
        EntityKind::SubstepDescription,
        EntityKind::SubstepPartTool,
        EntityKind::SubstepNote,
        EntityKind::SubstepTutorial,
        EntityKind::SubstepVideoSection,
        EntityKind::Video,
        EntityKind::VideoSection,
        EntityKind::VideoFrameArea,
        EntityKind::ViewportKeyframe,
        EntityKind::PartTool,
        EntityKind::Note,
        EntityKind::SafetyIcon,
        EntityKind::Drawing,
        EntityKind::PartToolVideoFrameArea,
    ];

    /// Key used for this kind in the wire change-set.
    pub const fn wire_key(self) -> &'static str {
        match self {
            EntityKind::Assembly => "assemblies",
            EntityKind::Step => "steps",
            EntityKind::Substep => "substeps",
            EntityKind::SubstepImage => "substep_images",
            EntityKind::SubstepDescription => "substep_descriptions",
            EntityKind::SubstepPartTool => "substep_part_tools",
            EntityKind::SubstepNote => "substep_notes",
            EntityKind::SubstepTutorial => "substep_tutorials",
            EntityKind::SubstepVideoSection => "substep_video_sections",
            EntityKind::Video => "videos",
            EntityKind::VideoSection => "video_sections",
            EntityKind::VideoFrameArea => "video_frame_areas",
            EntityKind::ViewportKeyframe => "viewport_keyframes",
            EntityKind::PartTool => "part_tools",
            EntityKind::Note => "notes",
            EntityKind::SafetyIcon => "safety_icons",
            EntityKind::Drawing => "drawings",
            EntityKind::PartToolVideoFrameArea => "part_tool_video_frame_areas",
        }
    }

    pub fn from_wire_key(key: &str) -> Option<EntityKind> {
        Self::ALL.into_iter().find(|kind| kind.wire_key() == key)
    }

    /// Dispatch to the row type for this kind.
    pub fn visit<V: KindVisitor>(self, visitor: V) -> V::Output {
        match self {
            EntityKind::Assembly => visitor.visit::<Assembly>(),
            EntityKind::Step => visitor.visit::<Step>(),
            EntityKind::Substep => visitor.visit::<Substep>(),
            EntityKind::SubstepImage => visitor.visit::<SubstepImage>(),
            EntityKind::SubstepDescription => visitor.visit::<SubstepDescription>(),
            EntityKind::SubstepPartTool => visitor.visit::<SubstepPartTool>(),
            EntityKind::SubstepNote => visitor.visit::<SubstepNote>(),
            EntityKind::SubstepTutorial => visitor.visit::<SubstepTutorial>(),
            EntityKind::SubstepVideoSection => visitor.visit::<SubstepVideoSection>(),
            EntityKind::Video => visitor.visit::<Video>(),
            EntityKind::VideoSection => visitor.visit::<VideoSection>(),
            EntityKind::VideoFrameArea => visitor.visit::<VideoFrameArea>(),
            EntityKind::ViewportKeyframe => visitor.visit::<ViewportKeyframe>(),
            EntityKind::PartTool => visitor.visit::<PartTool>(),
            EntityKind::Note => visitor.visit::<Note>(),
            EntityKind::SafetyIcon => visitor.visit::<SafetyIcon>(),
            EntityKind::Drawing => visitor.visit::<Drawing>(),
            EntityKind::PartToolVideoFrameArea => visitor.visit::<PartToolVideoFrameArea>(),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_key())
    }
}

/// A one-to-many relation whose forward side is a grouped id array on the
/// parent and whose backward side is a reference field on the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChildList {
    AssemblySteps,
    StepSubsteps,
    SubstepImages,
    SubstepDescriptions,
    SubstepPartTools,
    SubstepNotes,
    SubstepTutorials,
    SubstepVideoSections,
    VideoSections,
    VideoFrameAreas,
    VideoViewportKeyframes,
}

impl ChildList {
    pub const ALL: [ChildList; 11] = [
        ChildList::AssemblySteps,
        ChildList::StepSubsteps,
        ChildList::SubstepImages,
        ChildList::SubstepDescriptions,
        ChildList::SubstepPartTools,
        ChildList::SubstepNotes,
        ChildList::SubstepTutorials,
        ChildList::SubstepVideoSections,
        ChildList::VideoSections,
        ChildList::VideoFrameAreas,
        ChildList::VideoViewportKeyframes,
    ];

    pub const fn parent_kind(self) -> EntityKind {
        match self {
            ChildList::AssemblySteps => EntityKind::Assembly,
            ChildList::StepSubsteps => EntityKind::Step,
            ChildList::SubstepImages
            | ChildList::SubstepDescriptions
            | ChildList::SubstepPartTools
            | ChildList::SubstepNotes
            | ChildList::SubstepTutorials
            | ChildList::SubstepVideoSections => EntityKind::Substep,
            ChildList::VideoSections
            | ChildList::VideoFrameAreas
            | ChildList::VideoViewportKeyframes => EntityKind::Video,
        }
    }

    pub const fn child_kind(self) -> EntityKind {
        match self {
            ChildList::AssemblySteps => EntityKind::Step,
            ChildList::StepSubsteps => EntityKind::Substep,
            ChildList::SubstepImages => EntityKind::SubstepImage,
            ChildList::SubstepDescriptions => EntityKind::SubstepDescription,
            ChildList::SubstepPartTools => EntityKind::SubstepPartTool,
            ChildList::SubstepNotes => EntityKind::SubstepNote,
            ChildList::SubstepTutorials => EntityKind::SubstepTutorial,
            ChildList::SubstepVideoSections => EntityKind::SubstepVideoSection,
            ChildList::VideoSections => EntityKind::VideoSection,
            ChildList::VideoFrameAreas => EntityKind::VideoFrameArea,
            ChildList::VideoViewportKeyframes => EntityKind::ViewportKeyframe,
        }
    }

    /// Name of the grouped id array on the parent row (document naming).
    pub const fn field_name(self) -> &'static str {
        match self {
            ChildList::AssemblySteps => "stepIds",
            ChildList::StepSubsteps => "substepIds",
            ChildList::SubstepImages => "imageRowIds",
            ChildList::SubstepDescriptions => "descriptionRowIds",
            ChildList::SubstepPartTools => "partToolRowIds",
            ChildList::SubstepNotes => "noteRowIds",
            ChildList::SubstepTutorials => "tutorialRowIds",
            ChildList::SubstepVideoSections => "videoSectionRowIds",
            ChildList::VideoSections => "sectionIds",
            ChildList::VideoFrameAreas => "frameAreaIds",
            ChildList::VideoViewportKeyframes => "viewportKeyframeIds",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_keys_are_unique() {
        let mut keys: Vec<_> = EntityKind::ALL.iter().map(|k| k.wire_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), EntityKind::ALL.len());
    }

    #[test]
    fn test_from_wire_key() {
        assert_eq!(EntityKind::from_wire_key("substep_images"), Some(EntityKind::SubstepImage));
        assert_eq!(EntityKind::from_wire_key("substepImages"), None);
    }

    #[test]
    fn test_every_child_list_points_at_a_parent_kind() {
        for list in ChildList::ALL {
            assert_ne!(list.parent_kind(), list.child_kind());
            assert!(list.field_name().ends_with("Ids"));
        }
    }
}
