//! Replaying selections from one accessor onto another.

use crate::accessor::AccessorCore;
use crate::client::Client;
use crate::error::{ClientError, ClientResult};
use crate::value::FieldValue;
use lazyql_core::SelectionSpec;
use std::rc::Rc;
use tracing::{trace, warn};

impl Client {
    /// Replays every scalar selection read through `source` onto `target` and enqueues the
    /// replayed selections for fetching.
    ///
    /// Does nothing if either side is `null` or `Undefined`.
    pub fn assign_selections(&self, source: &FieldValue, target: &FieldValue) -> ClientResult<()> {
        if source.is_nullish() || target.is_nullish() {
            return Ok(());
        }

        let source = self.own_accessor(source, "Invalid source proxy")?;
        let target = self.own_accessor(target, "Invalid target proxy")?;

        let state = &self.state;
        let Some(history) = state.accessors.history(source.id) else {
            warn!(source = %source.selection, "Source proxy doesn't have any selections made");
            return Ok(());
        };

        let source_list = source.selection.selections_list();
        for selection in history {
            let mut mapped = Rc::clone(&target.selection);
            for step in selection
                .selections_list()
                .into_iter()
                .filter(|step| !source_list.contains(step))
            {
                mapped = state.selections.get_selection(
                    SelectionSpec::child(step.key().clone(), &mapped)
                        .with_args(step.args().cloned(), step.arg_types().cloned())
                        .with_unions(step.unions().cloned()),
                );
            }

            trace!(from = %selection, to = %mapped, "selection assigned");
            state.accessors.add_to_history(target.id, &mapped);
            state.interceptors.add_selection(&mapped);
        }
        Ok(())
    }

    fn own_accessor<'a>(
        &self,
        value: &'a FieldValue,
        message: &'static str,
    ) -> ClientResult<&'a Rc<AccessorCore>> {
        match value.core() {
            Some(core) if core.belongs_to(&self.state) => Ok(core),
            _ => Err(ClientError::invalid_proxy(message, "assign_selections")),
        }
    }
}
