use crate::native::{ColumnSlot, InputBind};

/// Owned copies of one execution's parameters. Dropped right after the call.
#[derive(Debug, Default)]
pub(crate) struct ParamBuffers {
    values: Vec<Option<Vec<u8>>>,
}

impl ParamBuffers {
    pub(crate) fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a [u8]>>,
    {
        Self {
            values: values.into_iter().map(|v| v.map(<[u8]>::to_vec)).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn binds(&self) -> Vec<InputBind<'_>> {
        self.values
            .iter()
            .map(|value| match value {
                Some(bytes) => InputBind::String(bytes),
                None => InputBind::Null,
            })
            .collect()
    }
}

/// Per-column indicators for one execution. Rebuilt on every execute.
#[derive(Debug, Default)]
pub(crate) struct OutputBindings {
    slots: Vec<ColumnSlot>,
}

impl OutputBindings {
    pub(crate) fn new(columns: usize) -> Self {
        Self {
            slots: vec![ColumnSlot::default(); columns],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&ColumnSlot> {
        self.slots.get(index)
    }

    pub(crate) fn slots(&self) -> &[ColumnSlot] {
        &self.slots
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [ColumnSlot] {
        &mut self.slots
    }
}
