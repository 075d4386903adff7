/*!
 * Shared store handle
 *
 * The keyed data store does not exist yet. This handle is the seam every
 * verb receives, so data verbs can land without changes to the transport
 * or protocol layers.
 */

/// Handle passed to every command evaluation.
///
/// Today it carries no state. When the keyspace lands, it lives behind
/// this type together with its own concurrency discipline; the event loop
/// only ever hands out shared references.
#[derive(Debug, Default)]
pub struct Store;

impl Store {
    pub fn new() -> Store {
        Store
    }
}
