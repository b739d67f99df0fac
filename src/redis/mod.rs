mod error;
mod executor;
mod gate;
pub mod keys;
pub mod linked_list;
pub mod list_dst;
pub mod meta;
pub mod set_dst;
pub mod skiplist;
pub mod sorted_set_dst;

pub use error::{CommandError, CommandResult};
pub use executor::{CommandExecutor, KeyReport};
pub use gate::{KeyGate, KeyGuard};
pub use keys::{KeyEncoder, Role};
pub use list_dst::{
    run_list_batch, summarize_list_batch, ListDSTConfig, ListDSTHarness, ListDSTResult,
};
pub use meta::{KeyMeta, KeyType, Score};
pub use set_dst::{run_set_batch, summarize_set_batch, SetDSTConfig, SetDSTHarness, SetDSTResult};
pub use sorted_set_dst::{
    run_sorted_set_batch, summarize_sorted_set_batch, SortedSetDSTConfig, SortedSetDSTHarness,
    SortedSetDSTResult,
};

use crate::config::EngineConfig;
use crate::io::SimulatedRng;
use crate::store::{InMemoryKvStore, SimulatedKvStore, SimulatedStoreConfig};

/// Executor over an in-memory store wrapped in fault injection
pub type SimulatedExecutor = CommandExecutor<SimulatedKvStore<InMemoryKvStore, SimulatedRng>>;

/// Build a fully seeded executor: skip-list levels and store faults both
/// derive from `seed`.
pub fn simulated_executor(seed: u64, store: SimulatedStoreConfig) -> SimulatedExecutor {
    let config = EngineConfig {
        seed: Some(seed),
        ..EngineConfig::test()
    };
    let store = SimulatedKvStore::new(
        InMemoryKvStore::new(),
        SimulatedRng::new(seed.wrapping_add(0x5eed)),
        store,
    );
    CommandExecutor::new(store, &config)
}
