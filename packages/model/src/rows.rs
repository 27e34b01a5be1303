//! Row types for every entity kind
//!
//! Rows serialize with camelCase field names, matching the document JSON the
//! editing layer loads. Back-references are plain id strings; forward
//! relations are the `*_ids` arrays ("grouped ids").

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ChildList, EntityKind, Instruction};

/// Common access to a row type and the table it lives in.
pub trait EntityRow: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &str;

    fn table(doc: &Instruction) -> &BTreeMap<String, Self>;

    fn table_mut(doc: &mut Instruction) -> &mut BTreeMap<String, Self>;

    /// The relation this row is a child in, with its current parent id.
    fn parent(&self) -> Option<(ChildList, &str)> {
        None
    }

    /// Empty every grouped id array carried by this row.
    fn clear_child_lists(&mut self) {}

    /// Copy id, back-references and grouped arrays from `original`.
    ///
    /// Field edits go through this after an update closure runs, so only
    /// payload fields survive; relations change via dedicated operations.
    fn preserve_relations(&mut self, original: &Self);
}

/// A junction row owned by a substep and kept in one of its element lists.
pub trait SubstepElement: EntityRow {
    const LIST: ChildList;

    fn substep_id(&self) -> &str;

    fn set_substep_id(&mut self, substep_id: String);

    fn order(&self) -> u32;

    fn set_order(&mut self, order: u32);
}

macro_rules! row_table {
    ($kind:ident, $field:ident) => {
        const KIND: EntityKind = EntityKind::$kind;

        fn id(&self) -> &str {
            &self.id
        }

        fn table(doc: &Instruction) -> &BTreeMap<String, Self> {
            &doc.$field
        }

        fn table_mut(doc: &mut Instruction) -> &mut BTreeMap<String, Self> {
            &mut doc.$field
        }
    };
}

macro_rules! substep_element {
    ($row:ident, $list:ident) => {
        impl SubstepElement for $row {
            const LIST: ChildList = ChildList::$list;

            fn substep_id(&self) -> &str {
                &self.substep_id
            }

            fn set_substep_id(&mut self, substep_id: String) {
                self.substep_id = substep_id;
            }

            fn order(&self) -> u32 {
                self.order
            }

            fn set_order(&mut self, order: u32) {
                self.order = order;
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Structure: assemblies, steps, substeps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assembly {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub preview_image_id: Option<String>,
    #[serde(default)]
    pub step_ids: Vec<String>,
}

impl EntityRow for Assembly {
    row_table!(Assembly, assemblies);

    fn clear_child_lists(&mut self) {
        self.step_ids.clear();
    }

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
        self.step_ids = original.step_ids.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub assembly_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub step_number: u32,
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    #[serde(default)]
    pub substep_ids: Vec<String>,
}

fn default_repeat_count() -> u32 {
    1
}

impl EntityRow for Step {
    row_table!(Step, steps);

    fn parent(&self) -> Option<(ChildList, &str)> {
        self.assembly_id
            .as_deref()
            .map(|id| (ChildList::AssemblySteps, id))
    }

    fn clear_child_lists(&mut self) {
        self.substep_ids.clear();
    }

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
        self.assembly_id = original.assembly_id.clone();
        self.substep_ids = original.substep_ids.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Substep {
    pub id: String,
    #[serde(default)]
    pub step_id: Option<String>,
    /// Dense 1..N rank among substeps of the same step; 0 when unassigned.
    #[serde(default)]
    pub step_order: u32,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_repeat_count")]
    pub repeat_count: u32,
    #[serde(default)]
    pub image_row_ids: Vec<String>,
    #[serde(default)]
    pub description_row_ids: Vec<String>,
    #[serde(default)]
    pub part_tool_row_ids: Vec<String>,
    #[serde(default)]
    pub note_row_ids: Vec<String>,
    #[serde(default)]
    pub tutorial_row_ids: Vec<String>,
    #[serde(default)]
    pub video_section_row_ids: Vec<String>,
}

impl Substep {
    pub fn element_ids(&self, list: ChildList) -> Option<&Vec<String>> {
        match list {
            ChildList::SubstepImages => Some(&self.image_row_ids),
            ChildList::SubstepDescriptions => Some(&self.description_row_ids),
            ChildList::SubstepPartTools => Some(&self.part_tool_row_ids),
            ChildList::SubstepNotes => Some(&self.note_row_ids),
            ChildList::SubstepTutorials => Some(&self.tutorial_row_ids),
            ChildList::SubstepVideoSections => Some(&self.video_section_row_ids),
            _ => None,
        }
    }

    pub fn element_ids_mut(&mut self, list: ChildList) -> Option<&mut Vec<String>> {
        match list {
            ChildList::SubstepImages => Some(&mut self.image_row_ids),
            ChildList::SubstepDescriptions => Some(&mut self.description_row_ids),
            ChildList::SubstepPartTools => Some(&mut self.part_tool_row_ids),
            ChildList::SubstepNotes => Some(&mut self.note_row_ids),
            ChildList::SubstepTutorials => Some(&mut self.tutorial_row_ids),
            ChildList::SubstepVideoSections => Some(&mut self.video_section_row_ids),
            _ => None,
        }
    }
}

impl EntityRow for Substep {
    row_table!(Substep, substeps);

    fn parent(&self) -> Option<(ChildList, &str)> {
        self.step_id.as_deref().map(|id| (ChildList::StepSubsteps, id))
    }

    fn clear_child_lists(&mut self) {
        self.image_row_ids.clear();
        self.description_row_ids.clear();
        self.part_tool_row_ids.clear();
        self.note_row_ids.clear();
        self.tutorial_row_ids.clear();
        self.video_section_row_ids.clear();
    }

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
        self.step_id = original.step_id.clone();
        self.step_order = original.step_order;
        self.image_row_ids = original.image_row_ids.clone();
        self.description_row_ids = original.description_row_ids.clone();
        self.part_tool_row_ids = original.part_tool_row_ids.clone();
        self.note_row_ids = original.note_row_ids.clone();
        self.tutorial_row_ids = original.tutorial_row_ids.clone();
        self.video_section_row_ids = original.video_section_row_ids.clone();
    }
}

// ---------------------------------------------------------------------------
// Substep junction rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstepImage {
    pub id: String,
    pub substep_id: String,
    pub video_frame_area_id: String,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstepDescription {
    pub id: String,
    pub substep_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstepPartTool {
    pub id: String,
    pub substep_id: String,
    pub part_tool_id: String,
    #[serde(default = "default_amount")]
    pub amount: u32,
    #[serde(default)]
    pub order: u32,
}

fn default_amount() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstepNote {
    pub id: String,
    pub substep_id: String,
    pub note_id: String,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TutorialKind {
    #[default]
    Tutorial,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstepTutorial {
    pub id: String,
    pub substep_id: String,
    #[serde(default)]
    pub kind: TutorialKind,
    /// Instruction or assembly the row links to.
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstepVideoSection {
    pub id: String,
    pub substep_id: String,
    pub video_section_id: String,
    #[serde(default)]
    pub order: u32,
}

macro_rules! junction_row {
    ($row:ident, $field:ident, $list:ident) => {
        impl EntityRow for $row {
            row_table!($row, $field);

            fn parent(&self) -> Option<(ChildList, &str)> {
                Some((ChildList::$list, self.substep_id.as_str()))
            }

            fn preserve_relations(&mut self, original: &Self) {
                self.id = original.id.clone();
                self.substep_id = original.substep_id.clone();
            }
        }

        substep_element!($row, $list);
    };
}

junction_row!(SubstepImage, substep_images, SubstepImages);
junction_row!(SubstepDescription, substep_descriptions, SubstepDescriptions);
junction_row!(SubstepPartTool, substep_part_tools, SubstepPartTools);
junction_row!(SubstepNote, substep_notes, SubstepNotes);
junction_row!(SubstepTutorial, substep_tutorials, SubstepTutorials);
junction_row!(SubstepVideoSection, substep_video_sections, SubstepVideoSections);

// ---------------------------------------------------------------------------
// Video and its owned rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    /// Media path relative to the project root.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub frame_count: u32,
    #[serde(default)]
    pub section_ids: Vec<String>,
    #[serde(default)]
    pub frame_area_ids: Vec<String>,
    #[serde(default)]
    pub viewport_keyframe_ids: Vec<String>,
}

impl Video {
    pub fn child_ids(&self, list: ChildList) -> Option<&Vec<String>> {
        match list {
            ChildList::VideoSections => Some(&self.section_ids),
            ChildList::VideoFrameAreas => Some(&self.frame_area_ids),
            ChildList::VideoViewportKeyframes => Some(&self.viewport_keyframe_ids),
            _ => None,
        }
    }

    pub fn child_ids_mut(&mut self, list: ChildList) -> Option<&mut Vec<String>> {
        match list {
            ChildList::VideoSections => Some(&mut self.section_ids),
            ChildList::VideoFrameAreas => Some(&mut self.frame_area_ids),
            ChildList::VideoViewportKeyframes => Some(&mut self.viewport_keyframe_ids),
            _ => None,
        }
    }
}

impl EntityRow for Video {
    row_table!(Video, videos);

    fn clear_child_lists(&mut self) {
        self.section_ids.clear();
        self.frame_area_ids.clear();
        self.viewport_keyframe_ids.clear();
    }

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
        self.section_ids = original.section_ids.clone();
        self.frame_area_ids = original.frame_area_ids.clone();
        self.viewport_keyframe_ids = original.viewport_keyframe_ids.clone();
    }
}

/// Inclusive frame range `[start_frame, end_frame]` of a video.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSection {
    pub id: String,
    pub video_id: String,
    pub start_frame: u32,
    pub end_frame: u32,
    #[serde(default)]
    pub title: Option<String>,
}

impl VideoSection {
    pub fn overlaps(&self, other: &VideoSection) -> bool {
        self.start_frame <= other.end_frame && other.start_frame <= self.end_frame
    }
}

impl EntityRow for VideoSection {
    row_table!(VideoSection, video_sections);

    fn parent(&self) -> Option<(ChildList, &str)> {
        Some((ChildList::VideoSections, self.video_id.as_str()))
    }

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
        self.video_id = original.video_id.clone();
    }
}

/// Normalized rectangle (0..1) within a video frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFrameArea {
    pub id: String,
    pub video_id: String,
    #[serde(default)]
    pub frame_number: Option<u32>,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    /// Cropped still rendered from this area, relative to the project root.
    #[serde(default)]
    pub image_path: Option<String>,
}

impl EntityRow for VideoFrameArea {
    row_table!(VideoFrameArea, video_frame_areas);

    fn parent(&self) -> Option<(ChildList, &str)> {
        Some((ChildList::VideoFrameAreas, self.video_id.as_str()))
    }

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
        self.video_id = original.video_id.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportKeyframe {
    pub id: String,
    pub video_id: String,
    pub frame_number: u32,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default = "default_extent")]
    pub width: f64,
    #[serde(default = "default_extent")]
    pub height: f64,
}

fn default_extent() -> f64 {
    1.0
}

impl ViewportKeyframe {
    /// Full-frame viewport at frame 0.
    pub fn initial(id: impl Into<String>, video_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            video_id: video_id.into(),
            frame_number: 0,
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

impl EntityRow for ViewportKeyframe {
    row_table!(ViewportKeyframe, viewport_keyframes);

    fn parent(&self) -> Option<(ChildList, &str)> {
        Some((ChildList::VideoViewportKeyframes, self.video_id.as_str()))
    }

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
        self.video_id = original.video_id.clone();
    }
}

// ---------------------------------------------------------------------------
// Catalog and annotation rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartToolType {
    #[default]
    Part,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartTool {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub part_number: Option<String>,
    #[serde(default)]
    pub part_tool_type: PartToolType,
    #[serde(default)]
    pub amount: u32,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub preview_image_id: Option<String>,
}

impl EntityRow for PartTool {
    row_table!(PartTool, part_tools);

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SafetyIconCategory {
    Warning,
    Mandatory,
    Prohibition,
    EmergencyInfo,
    FireProtection,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub safety_icon_id: Option<String>,
    #[serde(default)]
    pub safety_icon_category: Option<SafetyIconCategory>,
}

impl EntityRow for Note {
    row_table!(Note, notes);

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyIcon {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: SafetyIconCategory,
    #[serde(default)]
    pub image_path: Option<String>,
}

impl EntityRow for SafetyIcon {
    row_table!(SafetyIcon, safety_icons);

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawingShape {
    #[default]
    Arrow,
    Line,
    Circle,
    Rectangle,
    Freehand,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Annotation drawn on a substep image, or over a frame range of a substep's video.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drawing {
    pub id: String,
    #[serde(default)]
    pub substep_image_id: Option<String>,
    #[serde(default)]
    pub substep_id: Option<String>,
    #[serde(default)]
    pub shape: DrawingShape,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub stroke_width: f64,
    #[serde(default)]
    pub points: Vec<Point>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub start_frame: Option<u32>,
    #[serde(default)]
    pub end_frame: Option<u32>,
    #[serde(default)]
    pub order: u32,
}

impl EntityRow for Drawing {
    row_table!(Drawing, drawings);

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartToolVideoFrameArea {
    pub id: String,
    pub part_tool_id: String,
    pub video_frame_area_id: String,
    #[serde(default)]
    pub is_preview_image: bool,
}

impl EntityRow for PartToolVideoFrameArea {
    row_table!(PartToolVideoFrameArea, part_tool_video_frame_areas);

    fn preserve_relations(&mut self, original: &Self) {
        self.id = original.id.clone();
    }
}
