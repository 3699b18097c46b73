//! Registries map string identifiers to component factories.
//!
//! One generic `Registry<F>` backs every pluggable category (strategies,
//! filters, position rules, portfolio rules). Components are registered by
//! explicit calls, never discovered by scanning. The process-wide set is built
//! once by `init()` and is read-only afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{ConfigurationError, ResolutionError};
use crate::filter::{self, FilterFactory};
use crate::portfolio::{self, PortfolioRuleFactory};
use crate::position::{self, PositionRuleFactory};
use crate::strategy::{self, StrategyFactory};

/// Convert a type name into a lowercase hyphen-separated identifier.
///
/// Acronym-aware: `SMACrossover` → `sma-crossover`, `MaxCapitalDeployed` →
/// `max-capital-deployed`. Module paths and generic arguments are ignored.
pub fn derive_identifier(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let short = base.rsplit("::").next().unwrap_or(base);
    let chars: Vec<char> = short.chars().collect();

    let mut out = String::with_capacity(short.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary {
                out.push('-');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

#[derive(Clone, Copy)]
struct Entry<F> {
    type_name: &'static str,
    factory: F,
}

/// Identifier → factory table for one component category.
#[derive(Clone)]
pub struct Registry<F> {
    kind: &'static str,
    entries: BTreeMap<String, Entry<F>>,
}

impl<F> fmt::Debug for Registry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("identifiers", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<F: Copy> Registry<F> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Bind `identifier` to `factory`.
    ///
    /// Re-registering the same implementation is a no-op. Binding an
    /// identifier that already belongs to a different implementation fails,
    /// and so does a different factory presented under the same type name.
    pub fn register(
        &mut self,
        identifier: &str,
        type_name: &'static str,
        factory: F,
    ) -> Result<(), ConfigurationError>
    where
        F: PartialEq,
    {
        if let Some(existing) = self.entries.get(identifier) {
            if existing.type_name == type_name && existing.factory == factory {
                return Ok(());
            }
            return Err(ConfigurationError::DuplicateIdentifier {
                kind: self.kind,
                identifier: identifier.to_string(),
                existing: existing.type_name,
                attempted: type_name,
            });
        }
        self.entries
            .insert(identifier.to_string(), Entry { type_name, factory });
        Ok(())
    }

    /// Register under the identifier derived from `T`'s type name.
    pub fn register_type<T: ?Sized + 'static>(
        &mut self,
        factory: F,
    ) -> Result<String, ConfigurationError>
    where
        F: PartialEq,
    {
        let type_name = std::any::type_name::<T>();
        let identifier = derive_identifier(type_name);
        self.register(&identifier, type_name, factory)?;
        Ok(identifier)
    }

    pub fn resolve(&self, identifier: &str) -> Result<F, ResolutionError> {
        self.entries
            .get(identifier)
            .map(|e| e.factory)
            .ok_or_else(|| ResolutionError {
                kind: self.kind,
                identifier: identifier.to_string(),
                known: self
                    .entries
                    .keys()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub fn all_identifiers(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ─── Registry set ────────────────────────────────────────────────────

/// Every component registry used to resolve a backtest configuration.
#[derive(Debug, Clone)]
pub struct Registries {
    pub strategies: Registry<StrategyFactory>,
    pub filters: Registry<FilterFactory>,
    pub position_rules: Registry<PositionRuleFactory>,
    pub portfolio_rules: Registry<PortfolioRuleFactory>,
}

impl Registries {
    /// Registries with nothing registered.
    pub fn empty() -> Self {
        Self {
            strategies: Registry::new("strategy"),
            filters: Registry::new("filter"),
            position_rules: Registry::new("position rule"),
            portfolio_rules: Registry::new("portfolio rule"),
        }
    }

    /// Registries populated with the built-in registration lists.
    pub fn with_builtins() -> Result<Self, ConfigurationError> {
        let mut registries = Self::empty();
        strategy::register_builtins(&mut registries.strategies)?;
        filter::register_builtins(&mut registries.filters)?;
        position::register_builtins(&mut registries.position_rules)?;
        portfolio::register_builtins(&mut registries.portfolio_rules)?;
        Ok(registries)
    }
}

static GLOBAL: OnceLock<Registries> = OnceLock::new();

/// Build the process-wide built-in registries. Subsequent calls return the same set.
pub fn init() -> Result<&'static Registries, ConfigurationError> {
    if let Some(registries) = GLOBAL.get() {
        return Ok(registries);
    }
    let built = Registries::with_builtins()?;
    Ok(GLOBAL.get_or_init(|| built))
}

/// The process-wide registries, if `init()` has run.
pub fn global() -> Option<&'static Registries> {
    GLOBAL.get()
}
