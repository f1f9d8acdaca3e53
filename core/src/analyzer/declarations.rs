//! Variable and function declarations visible to the checker.

use indexmap::IndexMap;

use crate::types::{Type, is_compatible};

/// One signature of a declared function.
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadDecl {
    /// Globally unique overload id, used to bind an implementation.
    pub id: String,
    pub params: Vec<Type>,
    /// Number of leading parameters that must be supplied; the rest are optional.
    pub required: usize,
    pub result: Type,
}

impl OverloadDecl {
    pub fn new(id: impl Into<String>, params: Vec<Type>, result: Type) -> Self {
        let required = params.len();
        Self {
            id: id.into(),
            params,
            required,
            result,
        }
    }

    /// Mark trailing parameters after the first `required` as optional.
    pub fn with_required(mut self, required: usize) -> Self {
        self.required = required.min(self.params.len());
        self
    }

    pub fn accepts_arity(&self, arity: usize) -> bool {
        arity >= self.required && arity <= self.params.len()
    }

    /// Whether a call could be resolved to both overloads.
    pub fn overlaps(&self, other: &OverloadDecl) -> bool {
        let low = self.required.max(other.required);
        let high = self.params.len().min(other.params.len());
        if low > high {
            return false;
        }
        let shared = high;
        self.params[..shared]
            .iter()
            .zip(&other.params[..shared])
            .all(|(a, b)| is_compatible(a, b))
    }
}

/// A named function with one or more overloads.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub overloads: Vec<OverloadDecl>,
}

impl FunctionDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    pub fn overload(mut self, overload: OverloadDecl) -> Self {
        self.overloads.push(overload);
        self
    }
}

/// Language features toggled by environment options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    pub optional_types: bool,
    pub cross_type_numeric_comparisons: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Declarations {
    variables: IndexMap<String, Type>,
    functions: IndexMap<String, FunctionDecl>,
    pub features: Features,
}

impl Declarations {
    pub fn variable(&self, name: &str) -> Option<&Type> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &IndexMap<String, Type> {
        &self.variables
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.get(name)
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.functions.values()
    }

    pub fn overload(&self, id: &str) -> Option<&OverloadDecl> {
        self.functions
            .values()
            .flat_map(|f| &f.overloads)
            .find(|o| o.id == id)
    }

    pub fn add_variable(&mut self, name: &str, ty: Type) -> Result<(), String> {
        if self.variables.contains_key(name) {
            return Err(format!("overlapping identifier for name '{}'", name));
        }
        self.variables.insert(name.to_string(), ty);
        Ok(())
    }

    /// Add a function, merging its overloads into an existing declaration of
    /// the same name.
    pub fn add_function(&mut self, decl: FunctionDecl) -> Result<(), String> {
        for overload in &decl.overloads {
            if overload.required > overload.params.len() {
                return Err(format!(
                    "overload '{}' requires more parameters than it declares",
                    overload.id
                ));
            }
            if self.overload(&overload.id).is_some() {
                return Err(format!("overload id '{}' is already declared", overload.id));
            }
        }

        let existing = self
            .functions
            .entry(decl.name.clone())
            .or_insert_with(|| FunctionDecl::new(decl.name.clone()));
        let mut merged = existing.overloads.clone();
        for overload in decl.overloads {
            if let Some(other) = merged.iter().find(|o| o.overlaps(&overload)) {
                return Err(format!(
                    "overlapping overload for name '{}' (type '{}' collides with '{}')",
                    decl.name,
                    signature(&overload),
                    signature(other)
                ));
            }
            merged.push(overload);
        }
        existing.overloads = merged;
        Ok(())
    }
}

fn signature(overload: &OverloadDecl) -> String {
    let params: Vec<String> = overload.params.iter().map(|p| p.to_string()).collect();
    format!("({}) -> {}", params.join(", "), overload.result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_variable_is_rejected() {
        let mut decls = Declarations::default();
        decls.add_variable("x", Type::Int).unwrap();
        assert_eq!(
            decls.add_variable("x", Type::String),
            Err("overlapping identifier for name 'x'".to_string())
        );
    }

    #[test]
    fn test_overloads_merge_by_name() {
        let mut decls = Declarations::default();
        decls
            .add_function(FunctionDecl::new("f").overload(OverloadDecl::new(
                "f_int",
                vec![Type::Int],
                Type::Int,
            )))
            .unwrap();
        decls
            .add_function(FunctionDecl::new("f").overload(OverloadDecl::new(
                "f_string",
                vec![Type::String],
                Type::String,
            )))
            .unwrap();
        assert_eq!(decls.function("f").map(|f| f.overloads.len()), Some(2));
        assert!(decls.overload("f_string").is_some());
    }

    #[test]
    fn test_overlapping_signatures_are_rejected() {
        let mut decls = Declarations::default();
        decls
            .add_function(FunctionDecl::new("f").overload(OverloadDecl::new(
                "f_int",
                vec![Type::Int],
                Type::Int,
            )))
            .unwrap();
        let err = decls
            .add_function(FunctionDecl::new("f").overload(OverloadDecl::new(
                "f_dyn",
                vec![Type::Dyn],
                Type::Int,
            )))
            .unwrap_err();
        assert!(err.starts_with("overlapping overload for name 'f'"), "{}", err);
    }

    #[test]
    fn test_optional_params_overlap_by_arity() {
        let short = OverloadDecl::new("g_1", vec![Type::Int], Type::Int);
        let long =
            OverloadDecl::new("g_2", vec![Type::Int, Type::String], Type::Int).with_required(1);
        assert!(long.accepts_arity(1));
        assert!(long.accepts_arity(2));
        assert!(!long.accepts_arity(3));
        assert!(short.overlaps(&long));

        let strict = OverloadDecl::new("g_3", vec![Type::Int, Type::String], Type::Int);
        assert!(!short.overlaps(&strict));
    }

    #[test]
    fn test_duplicate_overload_id_is_rejected() {
        let mut decls = Declarations::default();
        let decl = FunctionDecl::new("h").overload(OverloadDecl::new("h_x", vec![], Type::Int));
        decls.add_function(decl.clone()).unwrap();
        assert!(decls.add_function(decl).is_err());
    }
}
