//! Generated column names and the per-compile name supply

use std::borrow::Cow;

/// A generated, compile-unique column alias.
///
/// Renders as `<hint>_<ident>` inside the outermost scope and
/// `<hint>_<scope>s_<ident>` inside nested subquery scopes. The hint is the
/// original column name for simple renames and `tmp` for computed columns;
/// it keeps generated SQL readable without affecting correctness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub hint: Cow<'static, str>,
    pub scope: u32,
    pub ident: u32,
}

impl Name {
    pub fn new(hint: impl Into<Cow<'static, str>>, scope: u32, ident: u32) -> Self {
        Self {
            hint: hint.into(),
            scope,
            ident,
        }
    }

    /// The identifier text this name renders as
    pub fn render(&self) -> String {
        if self.scope == 0 {
            format!("{}_{}", self.hint, self.ident)
        } else {
            format!("{}_{}s_{}", self.hint, self.scope, self.ident)
        }
    }
}

/// The two monotonic counters behind alias generation.
///
/// One supply is created per top-level compile and shared by reference
/// through every nested builder state, so structurally identical builder
/// programs always draw identical sequences and produce byte-identical SQL.
/// There is no process-global state to reset or to synchronize.
#[derive(Debug, Default)]
pub struct NameSupply {
    next_scope: u32,
    next_ident: u32,
}

impl NameSupply {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a scope id for a nested subquery level. Scope 0 belongs to
    /// the outermost compile and is never returned here.
    pub fn fresh_scope(&mut self) -> u32 {
        self.next_scope += 1;
        self.next_scope
    }

    /// Allocate the next compile-unique alias in the given scope
    pub fn fresh_name(&mut self, hint: impl Into<Cow<'static, str>>, scope: u32) -> Name {
        let ident = self.next_ident;
        self.next_ident += 1;
        Name::new(hint, scope, ident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_outermost_scope() {
        assert_eq!(Name::new("age", 0, 3).render(), "age_3");
        assert_eq!(Name::new("tmp", 0, 12).render(), "tmp_12");
    }

    #[test]
    fn test_render_nested_scope() {
        assert_eq!(Name::new("name", 2, 5).render(), "name_2s_5");
    }

    #[test]
    fn test_supply_is_sequential() {
        let mut supply = NameSupply::new();
        assert_eq!(supply.fresh_name("a", 0).ident, 0);
        assert_eq!(supply.fresh_name("b", 0).ident, 1);
        assert_eq!(supply.fresh_scope(), 1);
        assert_eq!(supply.fresh_scope(), 2);
        assert_eq!(supply.fresh_name("c", 2).render(), "c_2s_2");
    }

    #[test]
    fn test_fresh_supplies_repeat_sequences() {
        let mut first = NameSupply::new();
        let mut second = NameSupply::new();
        for hint in ["name", "age", "tmp"] {
            assert_eq!(first.fresh_name(hint, 0), second.fresh_name(hint, 0));
        }
    }
}
