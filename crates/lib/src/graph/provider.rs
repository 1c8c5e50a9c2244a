//! Per-module provider storage.
//!
//! A provider is a typed value a module publishes during one phase for other
//! modules to read in later phases. Each module owns one [`ProviderStore`],
//! keyed by the provider's type. A type can be published once per module;
//! later phases publish new types rather than replacing old values.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

/// A provider value on its way from a step to the store.
pub struct PendingProvider {
  type_id: TypeId,
  type_name: &'static str,
  value: Box<dyn Any + Send + Sync>,
}

impl PendingProvider {
  pub fn new<T: Any + Send + Sync>(value: T) -> Self {
    Self {
      type_id: TypeId::of::<T>(),
      type_name: type_name::<T>(),
      value: Box::new(value),
    }
  }
}

impl std::fmt::Debug for PendingProvider {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("PendingProvider").field("type", &self.type_name).finish()
  }
}

struct Published {
  phase: &'static str,
  type_name: &'static str,
  value: Box<dyn Any + Send + Sync>,
}

/// Providers published by one module.
#[derive(Default)]
pub struct ProviderStore {
  entries: HashMap<TypeId, Published>,
}

impl ProviderStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a provider published during `phase`.
  ///
  /// # Panics
  ///
  /// Panics if a provider of the same type was already published. Providers
  /// are immutable once written; a second write means two phases or two steps
  /// claim the same output, which is a wiring defect.
  pub fn publish(&mut self, phase: &'static str, pending: PendingProvider) {
    if let Some(existing) = self.entries.get(&pending.type_id) {
      panic!(
        "provider {} already published in phase '{}', republished in phase '{}'",
        existing.type_name, existing.phase, phase
      );
    }
    self.entries.insert(
      pending.type_id,
      Published {
        phase,
        type_name: pending.type_name,
        value: pending.value,
      },
    );
  }

  pub fn get<T: Any>(&self) -> Option<&T> {
    self.entries.get(&TypeId::of::<T>()).and_then(|p| p.value.downcast_ref::<T>())
  }
}

impl std::fmt::Debug for ProviderStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut names: Vec<_> = self.entries.values().map(|p| p.type_name).collect();
    names.sort_unstable();
    f.debug_struct("ProviderStore").field("providers", &names).finish()
  }
}
