//! # Substep Element Operations
//!
//! Reorder and move for the rows a substep lists (images, descriptions,
//! parts, tools, notes, tutorials, video-section links).
//!
//! Each [`SubstepElementKind`] resolves to a fixed [`ElementDescriptor`]: the
//! junction kind, the substep list holding it, and an optional filter. Parts
//! and tools share one junction table and one substep list; the filter splits
//! them into two logical lists by the linked catalog item's type.

use instruct_model::*;
use tracing::debug;

use crate::events::EventOperation;
use crate::InstructionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstepElementKind {
    Image,
    Description,
    Part,
    Tool,
    Note,
    Tutorial,
    VideoSection,
}

/// Decides whether a junction id belongs to a logical element list.
pub type ElementFilter = fn(&Instruction, &str) -> bool;

#[derive(Debug, Clone, Copy)]
pub struct ElementDescriptor {
    pub entity: EntityKind,
    pub list: ChildList,
    pub filter: Option<ElementFilter>,
}

impl SubstepElementKind {
    pub const ALL: [SubstepElementKind; 7] = [
        SubstepElementKind::Image,
        SubstepElementKind::Description,
        SubstepElementKind::Part,
        SubstepElementKind::Tool,
        SubstepElementKind::Note,
        SubstepElementKind::Tutorial,
        SubstepElementKind::VideoSection,
    ];

    pub const fn descriptor(self) -> ElementDescriptor {
        match self {
            SubstepElementKind::Image => ElementDescriptor {
                entity: EntityKind::SubstepImage,
                list: ChildList::SubstepImages,
                filter: None,
            },
            SubstepElementKind::Description => ElementDescriptor {
                entity: EntityKind::SubstepDescription,
                list: ChildList::SubstepDescriptions,
                filter: None,
            },
            SubstepElementKind::Part => ElementDescriptor {
                entity: EntityKind::SubstepPartTool,
                list: ChildList::SubstepPartTools,
                filter: Some(is_part_row),
            },
            SubstepElementKind::Tool => ElementDescriptor {
                entity: EntityKind::SubstepPartTool,
                list: ChildList::SubstepPartTools,
                filter: Some(is_tool_row),
            },
            SubstepElementKind::Note => ElementDescriptor {
                entity: EntityKind::SubstepNote,
                list: ChildList::SubstepNotes,
                filter: None,
            },
            SubstepElementKind::Tutorial => ElementDescriptor {
                entity: EntityKind::SubstepTutorial,
                list: ChildList::SubstepTutorials,
                filter: None,
            },
            SubstepElementKind::VideoSection => ElementDescriptor {
                entity: EntityKind::SubstepVideoSection,
                list: ChildList::SubstepVideoSections,
                filter: None,
            },
        }
    }
}

fn part_tool_type(doc: &Instruction, row_id: &str) -> Option<PartToolType> {
    let row = doc.substep_part_tools.get(row_id)?;
    Some(
        doc.part_tools
            .get(&row.part_tool_id)
            .map_or(PartToolType::Part, |item| item.part_tool_type),
    )
}

/// Parts and tools share one list; a row is classified by its catalog
/// item's `part_tool_type`, and rows whose catalog item is missing count
/// as parts.
fn is_part_row(doc: &Instruction, row_id: &str) -> bool {
    part_tool_type(doc, row_id) == Some(PartToolType::Part)
}

fn is_tool_row(doc: &Instruction, row_id: &str) -> bool {
    part_tool_type(doc, row_id) == Some(PartToolType::Tool)
}

impl InstructionStore {
    /// Ordered ids of one logical element list of a substep.
    pub fn substep_elements(&self, substep_id: &str, kind: SubstepElementKind) -> Vec<String> {
        let descriptor = kind.descriptor();
        let doc = self.document();
        doc.child_ids(descriptor.list, substep_id)
            .map(|ids| {
                ids.iter()
                    .filter(|id| descriptor.filter.map_or(true, |keep| keep(doc, id)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Move an element to `new_index` within its logical list and rewrite
    /// every `order` field to the element's position.
    pub fn reorder_substep_element(
        &mut self,
        element_id: &str,
        new_index: usize,
        kind: SubstepElementKind,
    ) -> bool {
        let filter = kind.descriptor().filter;
        match kind {
            SubstepElementKind::Image => self.reorder_rows::<SubstepImage>(element_id, new_index, filter),
            SubstepElementKind::Description => {
                self.reorder_rows::<SubstepDescription>(element_id, new_index, filter)
            }
            SubstepElementKind::Part | SubstepElementKind::Tool => {
                self.reorder_rows::<SubstepPartTool>(element_id, new_index, filter)
            }
            SubstepElementKind::Note => self.reorder_rows::<SubstepNote>(element_id, new_index, filter),
            SubstepElementKind::Tutorial => {
                self.reorder_rows::<SubstepTutorial>(element_id, new_index, filter)
            }
            SubstepElementKind::VideoSection => {
                self.reorder_rows::<SubstepVideoSection>(element_id, new_index, filter)
            }
        }
    }

    /// Re-parent an element onto another substep, appending it to the
    /// target's list.
    pub fn move_substep_element(
        &mut self,
        element_id: &str,
        new_substep_id: &str,
        kind: SubstepElementKind,
    ) -> bool {
        let filter = kind.descriptor().filter;
        match kind {
            SubstepElementKind::Image => self.move_row::<SubstepImage>(element_id, new_substep_id, filter),
            SubstepElementKind::Description => {
                self.move_row::<SubstepDescription>(element_id, new_substep_id, filter)
            }
            SubstepElementKind::Part | SubstepElementKind::Tool => {
                self.move_row::<SubstepPartTool>(element_id, new_substep_id, filter)
            }
            SubstepElementKind::Note => self.move_row::<SubstepNote>(element_id, new_substep_id, filter),
            SubstepElementKind::Tutorial => {
                self.move_row::<SubstepTutorial>(element_id, new_substep_id, filter)
            }
            SubstepElementKind::VideoSection => {
                self.move_row::<SubstepVideoSection>(element_id, new_substep_id, filter)
            }
        }
    }

    fn reorder_rows<R: SubstepElement>(
        &mut self,
        element_id: &str,
        new_index: usize,
        filter: Option<ElementFilter>,
    ) -> bool {
        let doc = self.document();
        let Some(element) = R::table(doc).get(element_id) else {
            return false;
        };
        let substep_id = element.substep_id().to_string();
        let Some(all_ids) = doc.child_ids(R::LIST, &substep_id).cloned() else {
            return false;
        };

        let in_list: Vec<bool> = all_ids
            .iter()
            .map(|id| filter.map_or(true, |keep| keep(doc, id)))
            .collect();
        let mut ordered: Vec<String> = all_ids
            .iter()
            .zip(&in_list)
            .filter(|(_, keep)| **keep)
            .map(|(id, _)| id.clone())
            .collect();

        let Some(current) = ordered.iter().position(|id| id == element_id) else {
            return false;
        };
        let target = new_index.min(ordered.len() - 1);
        if target == current {
            return false;
        }

        let moved = ordered.remove(current);
        ordered.insert(target, moved);

        // Filtered-out ids keep their slots; listed slots take the new order.
        let mut next = ordered.iter();
        let merged: Vec<String> = all_ids
            .iter()
            .zip(&in_list)
            .map(|(id, keep)| {
                if *keep {
                    next.next().cloned().unwrap_or_else(|| id.clone())
                } else {
                    id.clone()
                }
            })
            .collect();

        if let Some(ids) = self.document_mut().child_ids_mut(R::LIST, &substep_id) {
            *ids = merged;
        }

        for (index, id) in ordered.iter().enumerate() {
            let position = index as u32;
            let Some(row) = R::table_mut(self.document_mut()).get_mut(id) else {
                continue;
            };
            if row.order() == position {
                continue;
            }
            row.set_order(position);
            self.record_changed::<R>(id, EventOperation::Update, Some(vec!["order".into()]));
        }

        debug!(kind = %R::KIND, element_id = %element_id, from = current, to = target, "Reordered substep element");
        self.touch();
        true
    }

    fn move_row<R: SubstepElement>(
        &mut self,
        element_id: &str,
        new_substep_id: &str,
        filter: Option<ElementFilter>,
    ) -> bool {
        let doc = self.document();
        let Some(element) = R::table(doc).get(element_id) else {
            return false;
        };
        let source_id = element.substep_id().to_string();
        if source_id == new_substep_id
            || !doc.substeps.contains_key(&source_id)
            || !doc.substeps.contains_key(new_substep_id)
        {
            return false;
        }
        if filter.is_some_and(|keep| !keep(doc, element_id)) {
            return false;
        }

        // Appended after the target's existing elements of the same logical list.
        let order = doc
            .child_ids(R::LIST, new_substep_id)
            .map_or(0, |ids| {
                ids.iter()
                    .filter(|id| filter.map_or(true, |keep| keep(doc, id)))
                    .count()
            }) as u32;

        self.detach(R::LIST, &source_id, element_id);
        self.attach(R::LIST, new_substep_id, element_id);

        if let Some(row) = R::table_mut(self.document_mut()).get_mut(element_id) {
            row.set_substep_id(new_substep_id.to_string());
            row.set_order(order);
        }
        self.record_changed::<R>(
            element_id,
            EventOperation::Update,
            Some(vec!["substepId".into(), "order".into()]),
        );

        debug!(kind = %R::KIND, element_id = %element_id, from = %source_id, to = %new_substep_id, "Moved substep element");
        self.touch();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_and_tool_share_a_list_with_different_filters() {
        let part = SubstepElementKind::Part.descriptor();
        let tool = SubstepElementKind::Tool.descriptor();
        assert_eq!(part.list, tool.list);
        assert_eq!(part.entity, EntityKind::SubstepPartTool);
        assert!(part.filter.is_some() && tool.filter.is_some());
    }

    #[test]
    fn test_every_descriptor_targets_a_substep_list() {
        for kind in SubstepElementKind::ALL {
            let descriptor = kind.descriptor();
            assert_eq!(descriptor.list.parent_kind(), EntityKind::Substep);
            assert_eq!(descriptor.list.child_kind(), descriptor.entity);
        }
    }

    #[test]
    fn test_missing_catalog_item_counts_as_part() {
        let mut doc = Instruction::default();
        doc.substep_part_tools.insert(
            "r1".into(),
            SubstepPartTool {
                id: "r1".into(),
                substep_id: "ss1".into(),
                part_tool_id: "gone".into(),
                amount: 1,
                order: 0,
            },
        );
        assert!(is_part_row(&doc, "r1"));
        assert!(!is_tool_row(&doc, "r1"));
        assert!(!is_part_row(&doc, "unknown"));
    }
}
