use crate::common::Value;
use crate::errors::{ErrorKind, StrataError, StrataResult};
use crate::store::{Direction, Edge, EdgeId, EdgeType, RecordId};
use indexmap::IndexMap;
use smallvec::SmallVec;

/// Storage of one live record.
#[derive(Debug, Default)]
pub(crate) struct RecordSlot {
    properties: IndexMap<String, Value>,
    outgoing: SmallVec<[EdgeId; 4]>,
    incoming: SmallVec<[EdgeId; 2]>,
}

impl RecordSlot {
    fn with_properties(properties: IndexMap<String, Value>) -> Self {
        RecordSlot {
            properties,
            ..RecordSlot::default()
        }
    }

    fn has_edges(&self) -> bool {
        !self.outgoing.is_empty() || !self.incoming.is_empty()
    }
}

/// Inverse of one applied write.
#[derive(Debug)]
pub(crate) enum UndoOp {
    RecordCreated(RecordId),
    RecordDeleted(RecordId, IndexMap<String, Value>),
    EdgeCreated(EdgeId),
    EdgeDeleted(Edge),
    PropertyChanged {
        record: RecordId,
        key: String,
        previous: Option<Value>,
    },
}

/// Index-stable slots for records and edges.
///
/// The slot index is the identifier. Freed slots stay `None` forever so an
/// identifier is never handed out twice.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    records: Vec<Option<RecordSlot>>,
    edges: Vec<Option<Edge>>,
    live_records: usize,
}

impl Arena {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Arena {
            records: Vec::with_capacity(capacity),
            edges: Vec::with_capacity(capacity),
            live_records: 0,
        }
    }

    pub(crate) fn record_count(&self) -> usize {
        self.live_records
    }

    pub(crate) fn record_exists(&self, id: RecordId) -> bool {
        self.slot(id).is_some()
    }

    pub(crate) fn create_record(&mut self) -> (RecordId, UndoOp) {
        let id = RecordId::new(self.records.len() as u64);
        self.records.push(Some(RecordSlot::default()));
        self.live_records += 1;
        (id, UndoOp::RecordCreated(id))
    }

    pub(crate) fn delete_record(&mut self, id: RecordId) -> StrataResult<UndoOp> {
        let slot = self.slot_mut(id)?;
        if slot.has_edges() {
            return Err(StrataError::new(
                &format!(
                    "Record {} still has {} outgoing and {} incoming edges",
                    id,
                    slot.outgoing.len(),
                    slot.incoming.len()
                ),
                ErrorKind::RecordInUse,
            ));
        }

        let properties = std::mem::take(&mut slot.properties);
        self.records[id.value() as usize] = None;
        self.live_records -= 1;
        Ok(UndoOp::RecordDeleted(id, properties))
    }

    pub(crate) fn create_edge(
        &mut self,
        from: RecordId,
        to: RecordId,
        edge_type: &EdgeType,
    ) -> StrataResult<(EdgeId, UndoOp)> {
        // both ends must exist before anything is touched
        self.slot_ref(from)?;
        self.slot_ref(to)?;

        let id = EdgeId::new(self.edges.len() as u64);
        self.edges
            .push(Some(Edge::new(id, from, to, edge_type.clone())));
        self.slot_mut(from)?.outgoing.push(id);
        self.slot_mut(to)?.incoming.push(id);
        Ok((id, UndoOp::EdgeCreated(id)))
    }

    pub(crate) fn delete_edge(&mut self, id: EdgeId) -> StrataResult<UndoOp> {
        let edge = self
            .edges
            .get_mut(id.value() as usize)
            .and_then(Option::take)
            .ok_or_else(|| edge_not_found(id))?;

        if let Some(slot) = self.slot_mut_opt(edge.start()) {
            slot.outgoing.retain(|e| *e != id);
        }
        if let Some(slot) = self.slot_mut_opt(edge.end()) {
            slot.incoming.retain(|e| *e != id);
        }
        Ok(UndoOp::EdgeDeleted(edge))
    }

    pub(crate) fn edge(&self, id: EdgeId) -> StrataResult<Edge> {
        self.edges
            .get(id.value() as usize)
            .and_then(Option::as_ref)
            .cloned()
            .ok_or_else(|| edge_not_found(id))
    }

    pub(crate) fn edges_of(
        &self,
        id: RecordId,
        edge_type: &EdgeType,
        direction: Direction,
    ) -> StrataResult<Vec<Edge>> {
        let slot = self.slot_ref(id)?;
        let ids: Box<dyn Iterator<Item = &EdgeId>> = match direction {
            Direction::Outgoing => Box::new(slot.outgoing.iter()),
            Direction::Incoming => Box::new(slot.incoming.iter()),
            Direction::Both => Box::new(slot.outgoing.iter().chain(slot.incoming.iter())),
        };

        let mut result = Vec::new();
        for edge_id in ids {
            match self.edges.get(edge_id.value() as usize).and_then(Option::as_ref) {
                Some(edge) if edge.edge_type() == edge_type => {
                    // a self loop shows up in both lists
                    if direction == Direction::Both
                        && edge.start() == edge.end()
                        && result.iter().any(|e: &Edge| e.id() == edge.id())
                    {
                        continue;
                    }
                    result.push(edge.clone());
                }
                Some(_) => {}
                None => {
                    return Err(StrataError::new(
                        &format!("Record {} references missing edge {}", id, edge_id),
                        ErrorKind::InternalError,
                    ))
                }
            }
        }
        Ok(result)
    }

    pub(crate) fn get_property(&self, id: RecordId, key: &str) -> StrataResult<Option<Value>> {
        Ok(self.slot_ref(id)?.properties.get(key).cloned())
    }

    pub(crate) fn set_property(
        &mut self,
        id: RecordId,
        key: &str,
        value: Value,
    ) -> StrataResult<UndoOp> {
        let previous = self.slot_mut(id)?.properties.insert(key.to_string(), value);
        Ok(UndoOp::PropertyChanged {
            record: id,
            key: key.to_string(),
            previous,
        })
    }

    pub(crate) fn remove_property(
        &mut self,
        id: RecordId,
        key: &str,
    ) -> StrataResult<(Option<Value>, UndoOp)> {
        let previous = self.slot_mut(id)?.properties.shift_remove(key);
        let undo = UndoOp::PropertyChanged {
            record: id,
            key: key.to_string(),
            previous: previous.clone(),
        };
        Ok((previous, undo))
    }

    /// Reverts one journaled write. Operations must be undone in reverse
    /// order of application.
    pub(crate) fn undo(&mut self, op: UndoOp) -> StrataResult<()> {
        match op {
            UndoOp::RecordCreated(id) => {
                let slot = self.slot_ref(id)?;
                if slot.has_edges() {
                    return Err(StrataError::new(
                        &format!("Cannot undo creation of record {} with live edges", id),
                        ErrorKind::TransactionError,
                    ));
                }
                self.records[id.value() as usize] = None;
                self.live_records -= 1;
            }
            UndoOp::RecordDeleted(id, properties) => {
                let index = id.value() as usize;
                match self.records.get_mut(index) {
                    Some(slot) if slot.is_none() => {
                        *slot = Some(RecordSlot::with_properties(properties));
                        self.live_records += 1;
                    }
                    _ => {
                        return Err(StrataError::new(
                            &format!("Cannot restore record {}, slot is occupied or missing", id),
                            ErrorKind::TransactionError,
                        ))
                    }
                }
            }
            UndoOp::EdgeCreated(id) => {
                self.delete_edge(id)?;
            }
            UndoOp::EdgeDeleted(edge) => {
                let id = edge.id();
                let index = id.value() as usize;
                if !matches!(self.edges.get(index), Some(None)) {
                    return Err(StrataError::new(
                        &format!("Cannot restore edge {}, slot is occupied or missing", id),
                        ErrorKind::TransactionError,
                    ));
                }
                self.slot_ref(edge.start())?;
                self.slot_ref(edge.end())?;

                self.slot_mut(edge.start())?.outgoing.push(id);
                self.slot_mut(edge.end())?.incoming.push(id);
                self.edges[index] = Some(edge);
            }
            UndoOp::PropertyChanged {
                record,
                key,
                previous,
            } => {
                let properties = &mut self.slot_mut(record)?.properties;
                match previous {
                    Some(value) => {
                        properties.insert(key, value);
                    }
                    None => {
                        properties.shift_remove(&key);
                    }
                }
            }
        }
        Ok(())
    }

    fn slot(&self, id: RecordId) -> Option<&RecordSlot> {
        self.records.get(id.value() as usize).and_then(Option::as_ref)
    }

    fn slot_ref(&self, id: RecordId) -> StrataResult<&RecordSlot> {
        self.slot(id).ok_or_else(|| record_not_found(id))
    }

    fn slot_mut_opt(&mut self, id: RecordId) -> Option<&mut RecordSlot> {
        self.records
            .get_mut(id.value() as usize)
            .and_then(Option::as_mut)
    }

    fn slot_mut(&mut self, id: RecordId) -> StrataResult<&mut RecordSlot> {
        self.slot_mut_opt(id).ok_or_else(|| record_not_found(id))
    }
}

fn record_not_found(id: RecordId) -> StrataError {
    StrataError::new(
        &format!("Record {} not found", id),
        ErrorKind::RecordNotFound,
    )
}

fn edge_not_found(id: EdgeId) -> StrataError {
    StrataError::new(&format!("Edge {} not found", id), ErrorKind::EdgeNotFound)
}
