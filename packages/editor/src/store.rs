//! # Instruction Store
//!
//! The normalized in-memory document plus everything needed to save it:
//! change tracking, the last-saved baseline and an optional event sink.
//!
//! ## Lifecycle
//!
//! ```text
//! load ─▶ add/update/delete/assign/split/reorder/move ─▶ export_changes
//!   │                      │                                   │
//! baseline             tracker marks                     commit_saved
//!                      dirty ids                      (baseline advances)
//! ```
//!
//! ## Mutation semantics
//!
//! - Every mutation is synchronous and either applies fully or not at all.
//! - Stale ids are silent no-ops; refused operations log a warning.
//! - Every effective mutation bumps [`InstructionStore::revision`]; no-ops
//!   leave it untouched, which is what revision watchers rely on.
//!
//! ## Delete policy
//!
//! | Delete of        | Children                                               |
//! |------------------|--------------------------------------------------------|
//! | Assembly         | steps orphaned (`assembly_id = None`)                  |
//! | Step             | substeps orphaned (`step_id = None`, `step_order = 0`) |
//! | Substep          | junction rows, linked video sections, drawings deleted |
//! | SubstepImage     | its drawings deleted                                   |
//! | VideoSection     | junctions pointing at it deleted                       |
//! | VideoFrameArea   | part/tool frame-area links deleted                     |
//! | Video            | sections, frame areas and keyframes deleted            |
//! | PartTool         | substep part/tool rows and frame-area links deleted    |
//! | Note             | substep note rows deleted                              |
//! | frame-0 keyframe | refused                                                |

use instruct_model::*;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::change_tracker::ChangeTracker;
use crate::diff::diff_documents;
use crate::events::{changed_field_names, EntityEvent, EventOperation, EventSink};
use crate::export::{export_changes, ChangeSet};
use crate::rules::{next_step_order, Refusal, StoreRow};

pub struct InstructionStore {
    document: Instruction,
    baseline: Instruction,
    tracker: ChangeTracker,
    revision: u64,
    event_sink: Option<Box<dyn EventSink>>,
}

impl std::fmt::Debug for InstructionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstructionStore")
            .field("revision", &self.revision)
            .field("rows", &self.document.row_count())
            .field("dirty", &self.tracker.dirty_count())
            .field("event_sink", &self.event_sink.is_some())
            .finish()
    }
}

impl InstructionStore {
    /// Empty store; call [`InstructionStore::load`] to open a project.
    pub fn new() -> Self {
        Self {
            document: Instruction::default(),
            baseline: Instruction::default(),
            tracker: ChangeTracker::new(),
            revision: 0,
            event_sink: None,
        }
    }

    /// Store opened on `document`, which also becomes the saved baseline.
    pub fn with_document(document: Instruction) -> Self {
        let mut store = Self::new();
        store.load(document);
        store
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn load(&mut self, document: Instruction) {
        debug!(rows = document.row_count(), "Loading instruction document");
        self.baseline = document.clone();
        self.document = document;
        self.tracker.clear();
        self.touch();
    }

    /// Replace the document wholesale and re-derive tracking against the baseline.
    pub fn restore_data(&mut self, document: Instruction) {
        self.document = document;
        self.tracker = diff_documents(&self.document, &self.baseline);
        self.touch();
    }

    /// Forget tracked changes; the current document becomes the baseline.
    pub fn clear_changes(&mut self) {
        self.tracker.clear();
        self.baseline = self.document.clone();
    }

    /// Reconcile after `saved` (exported at `saved_revision`) was persisted.
    ///
    /// Edits that landed while the save was in flight stay dirty.
    pub fn commit_saved(&mut self, saved_revision: u64, saved: Instruction) {
        self.baseline = saved;
        if self.revision == saved_revision {
            self.tracker.clear();
        } else {
            debug!(
                saved_revision,
                revision = self.revision,
                "Document changed during save; re-deriving tracked changes"
            );
            self.tracker = diff_documents(&self.document, &self.baseline);
        }
    }

    /// Drop the document and all tracking state.
    pub fn reset(&mut self) {
        self.document = Instruction::default();
        self.baseline = Instruction::default();
        self.tracker.clear();
        self.touch();
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn document(&self) -> &Instruction {
        &self.document
    }

    pub fn baseline(&self) -> &Instruction {
        &self.baseline
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn has_changes(&self) -> bool {
        self.tracker.has_changes()
    }

    pub fn export_changes(&self) -> ChangeSet {
        export_changes(&self.document, &self.tracker)
    }

    pub fn get<R: EntityRow>(&self, id: &str) -> Option<&R> {
        R::table(&self.document).get(id)
    }

    pub fn rows<R: EntityRow>(&self) -> impl Iterator<Item = &R> {
        R::table(&self.document).values()
    }

    pub fn set_event_sink(&mut self, sink: impl EventSink + 'static) {
        self.event_sink = Some(Box::new(sink));
    }

    pub fn clear_event_sink(&mut self) {
        self.event_sink = None;
    }

    // -----------------------------------------------------------------------
    // Generic mutations
    // -----------------------------------------------------------------------

    /// Edit the singleton instruction fields.
    pub fn update_instruction(&mut self, edit: impl FnOnce(&mut InstructionMeta)) -> bool {
        let mut meta = self.document.instruction.clone();
        edit(&mut meta);
        if meta == self.document.instruction {
            return false;
        }

        self.document.instruction = meta;
        self.tracker.mark_instruction_changed();
        self.touch();
        true
    }

    /// Insert a row and attach it to its parent's grouped array.
    pub fn add<R: StoreRow>(&mut self, mut row: R) -> bool {
        let id = row.id().to_string();

        if let Err(refusal) = self.admit(&mut row) {
            warn!(kind = %R::KIND, id = %id, reason = %refusal, "Refusing add");
            return false;
        }

        if let Some((list, parent_id)) = row.parent() {
            let parent_id = parent_id.to_string();
            self.attach(list, &parent_id, &id);
        }

        R::table_mut(&mut self.document).insert(id.clone(), row);
        self.record_changed::<R>(&id, EventOperation::Create, None);

        if R::KIND == EntityKind::Video {
            self.ensure_initial_keyframe(&id);
        }

        debug!(kind = %R::KIND, id = %id, "Added row");
        self.touch();
        true
    }

    fn admit<R: StoreRow>(&self, row: &mut R) -> Result<(), Refusal> {
        if R::table(&self.document).contains_key(row.id()) {
            return Err(Refusal::DuplicateId);
        }

        row.clear_child_lists();

        if let Some((list, parent_id)) = row.parent() {
            if !self.document.contains(list.parent_kind(), parent_id) {
                return Err(Refusal::MissingParent(parent_id.to_string()));
            }
        }

        row.prepare_insert(&self.document)
    }

    /// Edit a row's payload fields; relation fields are kept as stored.
    pub fn update<R: StoreRow>(&mut self, id: &str, edit: impl FnOnce(&mut R)) -> bool {
        let Some(original) = R::table(&self.document).get(id).cloned() else {
            return false;
        };

        let mut edited = original.clone();
        edit(&mut edited);
        edited.preserve_relations(&original);

        if edited == original {
            return false;
        }

        if let Err(refusal) = edited.validate_update(&original, &self.document) {
            warn!(kind = %R::KIND, id = %id, reason = %refusal, "Refusing update");
            return false;
        }

        let fields = match (serde_json::to_value(&original), serde_json::to_value(&edited)) {
            (Ok(before), Ok(after)) => changed_field_names(&before, &after),
            _ => Vec::new(),
        };

        R::table_mut(&mut self.document).insert(id.to_string(), edited);
        self.record_changed::<R>(id, EventOperation::Update, Some(fields));
        self.touch();
        true
    }

    pub fn delete<R: EntityRow>(&mut self, id: &str) -> bool {
        self.delete_entity(R::KIND, id)
    }

    /// Delete by kind, applying the relation's orphan or cascade policy.
    pub fn delete_entity(&mut self, kind: EntityKind, id: &str) -> bool {
        if !self.document.contains(kind, id) {
            return false;
        }

        match kind {
            EntityKind::Assembly => {
                for step_id in self.back_referencing::<Step>(ChildList::AssemblySteps, id) {
                    self.set_step_assembly(&step_id, None);
                }
                self.remove_row::<Assembly>(id);
            }
            EntityKind::Step => {
                for substep_id in self.back_referencing::<Substep>(ChildList::StepSubsteps, id) {
                    self.set_substep_step(&substep_id, None);
                }
                self.remove_row::<Step>(id);
            }
            EntityKind::Substep => self.delete_substep(id),
            EntityKind::SubstepImage => {
                let drawing_ids: Vec<String> = self
                    .document
                    .drawings
                    .values()
                    .filter(|d| d.substep_image_id.as_deref() == Some(id))
                    .map(|d| d.id.clone())
                    .collect();
                for drawing_id in drawing_ids {
                    self.remove_row::<Drawing>(&drawing_id);
                }
                self.remove_row::<SubstepImage>(id);
            }
            EntityKind::SubstepDescription => {
                self.remove_row::<SubstepDescription>(id);
            }
            EntityKind::SubstepPartTool => {
                self.remove_row::<SubstepPartTool>(id);
            }
            EntityKind::SubstepNote => {
                self.remove_row::<SubstepNote>(id);
            }
            EntityKind::SubstepTutorial => {
                self.remove_row::<SubstepTutorial>(id);
            }
            EntityKind::SubstepVideoSection => {
                self.remove_row::<SubstepVideoSection>(id);
            }
            EntityKind::Video => self.delete_video(id),
            EntityKind::VideoSection => self.delete_video_section(id),
            EntityKind::VideoFrameArea => {
                self.delete_frame_area_links(|link| link.video_frame_area_id == id);
                self.remove_row::<VideoFrameArea>(id);
            }
            EntityKind::ViewportKeyframe => {
                let initial = self
                    .document
                    .viewport_keyframes
                    .get(id)
                    .is_some_and(|k| k.frame_number == 0);
                if initial {
                    warn!(keyframe_id = %id, "Refusing to delete the frame-0 viewport keyframe");
                    return false;
                }
                self.remove_row::<ViewportKeyframe>(id);
            }
            EntityKind::PartTool => {
                self.delete_frame_area_links(|link| link.part_tool_id == id);
                let row_ids: Vec<String> = self
                    .document
                    .substep_part_tools
                    .values()
                    .filter(|row| row.part_tool_id == id)
                    .map(|row| row.id.clone())
                    .collect();
                for row_id in row_ids {
                    self.remove_row::<SubstepPartTool>(&row_id);
                }
                self.remove_row::<PartTool>(id);
            }
            EntityKind::Note => {
                let row_ids: Vec<String> = self
                    .document
                    .substep_notes
                    .values()
                    .filter(|row| row.note_id == id)
                    .map(|row| row.id.clone())
                    .collect();
                for row_id in row_ids {
                    self.remove_row::<SubstepNote>(&row_id);
                }
                self.remove_row::<Note>(id);
            }
            EntityKind::SafetyIcon => {
                self.remove_row::<SafetyIcon>(id);
            }
            EntityKind::Drawing => {
                self.remove_row::<Drawing>(id);
            }
            EntityKind::PartToolVideoFrameArea => {
                self.remove_row::<PartToolVideoFrameArea>(id);
            }
        }

        debug!(kind = %kind, id = %id, "Deleted row");
        self.touch();
        true
    }

    fn delete_substep(&mut self, id: &str) {
        let Some(substep) = self.document.substeps.get(id).cloned() else {
            return;
        };

        for image_id in &substep.image_row_ids {
            self.delete_entity(EntityKind::SubstepImage, image_id);
        }
        for row_id in &substep.description_row_ids {
            self.remove_row::<SubstepDescription>(row_id);
        }
        for row_id in &substep.part_tool_row_ids {
            self.remove_row::<SubstepPartTool>(row_id);
        }
        for row_id in &substep.note_row_ids {
            self.remove_row::<SubstepNote>(row_id);
        }
        for row_id in &substep.tutorial_row_ids {
            self.remove_row::<SubstepTutorial>(row_id);
        }
        for row_id in &substep.video_section_row_ids {
            let section_id = self
                .document
                .substep_video_sections
                .get(row_id)
                .map(|link| link.video_section_id.clone());
            match section_id {
                // Removes this link along with every other link to the section.
                Some(section_id) if self.document.video_sections.contains_key(&section_id) => {
                    self.delete_video_section(&section_id)
                }
                _ => {
                    self.remove_row::<SubstepVideoSection>(row_id);
                }
            }
        }

        let drawing_ids: Vec<String> = self
            .document
            .drawings
            .values()
            .filter(|d| d.substep_id.as_deref() == Some(id))
            .map(|d| d.id.clone())
            .collect();
        for drawing_id in drawing_ids {
            self.remove_row::<Drawing>(&drawing_id);
        }

        self.remove_row::<Substep>(id);
        if let Some(step_id) = &substep.step_id {
            self.renumber_step(step_id);
        }
    }

    fn delete_video_section(&mut self, id: &str) {
        let link_ids: Vec<String> = self
            .document
            .substep_video_sections
            .values()
            .filter(|link| link.video_section_id == id)
            .map(|link| link.id.clone())
            .collect();
        for link_id in link_ids {
            self.remove_row::<SubstepVideoSection>(&link_id);
        }
        self.remove_row::<VideoSection>(id);
    }

    fn delete_video(&mut self, id: &str) {
        for section_id in self.back_referencing::<VideoSection>(ChildList::VideoSections, id) {
            self.delete_video_section(&section_id);
        }
        for area_id in self.back_referencing::<VideoFrameArea>(ChildList::VideoFrameAreas, id) {
            self.delete_frame_area_links(|link| link.video_frame_area_id == area_id);
            self.remove_row::<VideoFrameArea>(&area_id);
        }
        // The video goes away, so its frame-0 keyframe may go too.
        for keyframe_id in
            self.back_referencing::<ViewportKeyframe>(ChildList::VideoViewportKeyframes, id)
        {
            self.remove_row::<ViewportKeyframe>(&keyframe_id);
        }
        self.remove_row::<Video>(id);
    }

    fn delete_frame_area_links(&mut self, matches: impl Fn(&PartToolVideoFrameArea) -> bool) {
        let link_ids: Vec<String> = self
            .document
            .part_tool_video_frame_areas
            .values()
            .filter(|link| matches(link))
            .map(|link| link.id.clone())
            .collect();
        for link_id in link_ids {
            self.remove_row::<PartToolVideoFrameArea>(&link_id);
        }
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    pub fn assign_step_to_assembly(&mut self, step_id: &str, assembly_id: Option<&str>) -> bool {
        let Some(step) = self.document.steps.get(step_id) else {
            return false;
        };
        if step.assembly_id.as_deref() == assembly_id {
            return false;
        }
        if let Some(target) = assembly_id {
            if !self.document.assemblies.contains_key(target) {
                warn!(step_id = %step_id, assembly_id = %target, "Refusing assignment to missing assembly");
                return false;
            }
        }

        self.set_step_assembly(step_id, assembly_id);
        self.touch();
        true
    }

    pub fn assign_substep_to_step(&mut self, substep_id: &str, step_id: Option<&str>) -> bool {
        let Some(substep) = self.document.substeps.get(substep_id) else {
            return false;
        };
        if substep.step_id.as_deref() == step_id {
            return false;
        }
        if let Some(target) = step_id {
            if !self.document.steps.contains_key(target) {
                warn!(substep_id = %substep_id, step_id = %target, "Refusing assignment to missing step");
                return false;
            }
        }

        self.set_substep_step(substep_id, step_id);
        self.touch();
        true
    }

    fn set_step_assembly(&mut self, step_id: &str, assembly_id: Option<&str>) {
        let Some(step) = self.document.steps.get_mut(step_id) else {
            return;
        };
        let previous = std::mem::replace(&mut step.assembly_id, assembly_id.map(str::to_string));

        if let Some(previous) = previous {
            self.detach(ChildList::AssemblySteps, &previous, step_id);
        }
        if let Some(target) = assembly_id {
            self.attach(ChildList::AssemblySteps, target, step_id);
        }

        self.record_changed::<Step>(step_id, EventOperation::Update, Some(vec!["assemblyId".into()]));
    }

    fn set_substep_step(&mut self, substep_id: &str, step_id: Option<&str>) {
        let step_order = match step_id {
            Some(target) => next_step_order(&self.document, target),
            None => 0,
        };

        let Some(substep) = self.document.substeps.get_mut(substep_id) else {
            return;
        };
        let previous = std::mem::replace(&mut substep.step_id, step_id.map(str::to_string));
        substep.step_order = step_order;

        if let Some(previous) = &previous {
            self.detach(ChildList::StepSubsteps, previous, substep_id);
        }
        if let Some(target) = step_id {
            self.attach(ChildList::StepSubsteps, target, substep_id);
        }

        self.record_changed::<Substep>(
            substep_id,
            EventOperation::Update,
            Some(vec!["stepId".into(), "stepOrder".into()]),
        );

        if let Some(previous) = previous {
            self.renumber_step(&previous);
        }
    }

    /// Rewrite `step_order` of a step's substeps to a dense 1..N.
    fn renumber_step(&mut self, step_id: &str) {
        let position_in_step = |id: &str, doc: &Instruction| {
            doc.steps
                .get(step_id)
                .and_then(|s| s.substep_ids.iter().position(|x| x == id))
                .unwrap_or(usize::MAX)
        };

        let mut siblings: Vec<(u32, usize, String)> = self
            .document
            .substeps_of_step(step_id)
            .iter()
            .map(|s| (s.step_order, position_in_step(&s.id, &self.document), s.id.clone()))
            .collect();
        siblings.sort();

        for (index, (order, _, id)) in siblings.into_iter().enumerate() {
            let dense = index as u32 + 1;
            if order == dense {
                continue;
            }
            if let Some(substep) = self.document.substeps.get_mut(&id) {
                substep.step_order = dense;
                self.record_changed::<Substep>(&id, EventOperation::Update, Some(vec!["stepOrder".into()]));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Video sections
    // -----------------------------------------------------------------------

    /// Split a section around `split_frame`, which belongs to neither half.
    ///
    /// Returns the new section's id, or `None` unless
    /// `start_frame < split_frame < end_frame`.
    pub fn split_video_section(&mut self, section_id: &str, split_frame: u32) -> Option<String> {
        let original = self.document.video_sections.get(section_id)?.clone();

        if !(original.start_frame < split_frame && split_frame < original.end_frame) {
            warn!(
                section_id = %section_id,
                split_frame,
                start = original.start_frame,
                end = original.end_frame,
                "Split frame outside section"
            );
            return None;
        }

        let new_id = Uuid::new_v4().to_string();
        let second = VideoSection {
            id: new_id.clone(),
            video_id: original.video_id.clone(),
            start_frame: split_frame + 1,
            end_frame: original.end_frame,
            title: original.title.clone(),
        };

        if let Some(first) = self.document.video_sections.get_mut(section_id) {
            first.end_frame = split_frame - 1;
        }
        self.record_changed::<VideoSection>(section_id, EventOperation::Update, Some(vec!["endFrame".into()]));

        self.attach(ChildList::VideoSections, &original.video_id, &new_id);
        self.document.video_sections.insert(new_id.clone(), second);
        self.record_changed::<VideoSection>(&new_id, EventOperation::Create, None);

        let links: Vec<SubstepVideoSection> = self
            .document
            .substep_video_sections
            .values()
            .filter(|link| link.video_section_id == section_id)
            .cloned()
            .collect();

        for link in links {
            let duplicate = SubstepVideoSection {
                id: Uuid::new_v4().to_string(),
                substep_id: link.substep_id.clone(),
                video_section_id: new_id.clone(),
                order: link.order + 1,
            };

            if let Some(ids) = self
                .document
                .child_ids_mut(ChildList::SubstepVideoSections, &link.substep_id)
            {
                match ids.iter().position(|id| *id == link.id) {
                    Some(index) => ids.insert(index + 1, duplicate.id.clone()),
                    None => ids.push(duplicate.id.clone()),
                }
            }

            let duplicate_id = duplicate.id.clone();
            self.document
                .substep_video_sections
                .insert(duplicate_id.clone(), duplicate);
            self.record_changed::<SubstepVideoSection>(&duplicate_id, EventOperation::Create, None);
        }

        debug!(section_id = %section_id, new_section_id = %new_id, split_frame, "Split video section");
        self.touch();
        Some(new_id)
    }

    fn ensure_initial_keyframe(&mut self, video_id: &str) {
        if self
            .document
            .keyframes_of_video(video_id)
            .any(|k| k.frame_number == 0)
        {
            return;
        }

        let keyframe = ViewportKeyframe::initial(Uuid::new_v4().to_string(), video_id);
        let keyframe_id = keyframe.id.clone();
        self.attach(ChildList::VideoViewportKeyframes, video_id, &keyframe_id);
        self.document
            .viewport_keyframes
            .insert(keyframe_id.clone(), keyframe);
        self.record_changed::<ViewportKeyframe>(&keyframe_id, EventOperation::Create, None);
    }

    // -----------------------------------------------------------------------
    // Internals shared with element operations
    // -----------------------------------------------------------------------

    pub(crate) fn document_mut(&mut self) -> &mut Instruction {
        &mut self.document
    }

    /// Append `child_id` to a parent's grouped array unless already present.
    pub(crate) fn attach(&mut self, list: ChildList, parent_id: &str, child_id: &str) {
        if let Some(ids) = self.document.child_ids_mut(list, parent_id) {
            if !ids.iter().any(|id| id == child_id) {
                ids.push(child_id.to_string());
            }
        }
    }

    pub(crate) fn detach(&mut self, list: ChildList, parent_id: &str, child_id: &str) {
        if let Some(ids) = self.document.child_ids_mut(list, parent_id) {
            ids.retain(|id| id != child_id);
        }
    }

    /// Ids of `R` rows whose back-reference in `list` is `parent_id`.
    fn back_referencing<R: EntityRow>(&self, list: ChildList, parent_id: &str) -> Vec<String> {
        R::table(&self.document)
            .values()
            .filter(|row| row.parent() == Some((list, parent_id)))
            .map(|row| row.id().to_string())
            .collect()
    }

    /// Remove a row, detach it from its parent and mark it deleted.
    fn remove_row<R: EntityRow>(&mut self, id: &str) -> Option<R> {
        let row = R::table_mut(&mut self.document).remove(id)?;

        if let Some((list, parent_id)) = row.parent() {
            let parent_id = parent_id.to_string();
            self.detach(list, &parent_id, id);
        }

        self.tracker.mark_deleted(R::KIND, id);
        if let Some(sink) = &self.event_sink {
            sink.record(EntityEvent {
                kind: R::KIND,
                entity_id: id.to_string(),
                operation: EventOperation::Delete,
                row: serde_json::to_value(&row).unwrap_or(Value::Null),
                changed_fields: None,
            });
        }
        Some(row)
    }

    pub(crate) fn record_changed<R: EntityRow>(
        &mut self,
        id: &str,
        operation: EventOperation,
        changed_fields: Option<Vec<String>>,
    ) {
        self.tracker.mark_changed(R::KIND, id);

        if let Some(sink) = &self.event_sink {
            let row = R::table(&self.document)
                .get(id)
                .and_then(|row| serde_json::to_value(row).ok())
                .unwrap_or(Value::Null);
            sink.record(EntityEvent {
                kind: R::KIND,
                entity_id: id.to_string(),
                operation,
                row,
                changed_fields,
            });
        }
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }
}

impl Default for InstructionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn store_with_step() -> InstructionStore {
        let mut store = InstructionStore::new();
        store.add(Assembly { id: "a1".into(), ..Default::default() });
        store.add(Step { id: "s1".into(), assembly_id: Some("a1".into()), ..Default::default() });
        store
    }

    #[test]
    fn test_add_attaches_to_parent_once() {
        let mut store = store_with_step();
        assert_eq!(store.document().assemblies["a1"].step_ids, vec!["s1".to_string()]);

        // Same id again is refused rather than duplicated.
        assert!(!store.add(Step { id: "s1".into(), assembly_id: Some("a1".into()), ..Default::default() }));
        assert_eq!(store.document().assemblies["a1"].step_ids.len(), 1);
    }

    #[test]
    fn test_add_with_missing_parent_is_refused() {
        let mut store = InstructionStore::new();
        let revision = store.revision();

        assert!(!store.add(Step { id: "s1".into(), assembly_id: Some("nope".into()), ..Default::default() }));
        assert!(store.document().steps.is_empty());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_update_missing_id_is_noop() {
        let mut store = InstructionStore::new();
        assert!(!store.update::<Note>("ghost", |n| n.text = "x".into()));
        assert!(!store.delete::<Note>("ghost"));
        assert!(!store.has_changes());
    }

    #[test]
    fn test_update_cannot_touch_relations() {
        let mut store = store_with_step();
        store.update::<Step>("s1", |s| {
            s.title = "Mount frame".into();
            s.assembly_id = None;
        });

        let step = &store.document().steps["s1"];
        assert_eq!(step.title, "Mount frame");
        assert_eq!(step.assembly_id.as_deref(), Some("a1"));
    }

    #[test]
    fn test_update_instruction_marks_flag() {
        let mut store = InstructionStore::new();
        assert!(store.update_instruction(|meta| meta.name = "Grinder".into()));
        assert!(store.tracker().instruction_changed());
        assert!(!store.update_instruction(|meta| meta.name = "Grinder".into()));
    }

    #[test]
    fn test_event_sink_receives_operations() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);

        let mut store = InstructionStore::new();
        store.set_event_sink(move |event: EntityEvent| sink_events.lock().unwrap().push(event));

        store.add(Note { id: "n1".into(), text: "Hot".into(), ..Default::default() });
        store.update::<Note>("n1", |n| n.text = "Very hot".into());
        store.delete::<Note>("n1");

        let events = events.lock().unwrap();
        let ops: Vec<_> = events.iter().map(|e| e.operation).collect();
        assert_eq!(ops, vec![EventOperation::Create, EventOperation::Update, EventOperation::Delete]);
        assert_eq!(events[1].changed_fields, Some(vec!["text".to_string()]));
        assert_eq!(events[1].row["text"], "Very hot");
    }

    #[test]
    fn test_commit_saved_keeps_edits_made_during_save() {
        let mut store = store_with_step();
        let saved_revision = store.revision();
        let snapshot = store.document().clone();

        store.update::<Step>("s1", |s| s.title = "Edited mid-save".into());
        store.commit_saved(saved_revision, snapshot);

        assert!(store.has_changes());
        assert!(store.tracker().kind(EntityKind::Step).changed.contains("s1"));
        assert!(store.tracker().kind(EntityKind::Assembly).changed.is_empty());
    }

    #[test]
    fn test_commit_saved_without_intervening_edits_clears() {
        let mut store = store_with_step();
        store.commit_saved(store.revision(), store.document().clone());
        assert!(!store.has_changes());
    }
}
