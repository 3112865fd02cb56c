//! Security context lowering.
//!
//! A resolved CIL context is four references plus an optional MLS range;
//! lowering turns each into its database value and, when MLS is on,
//! expands the range's category sets over the database category numbering.

use crate::lower::LowerMaps;
use secil_base::{Bitmap, CompileError, ErrorKind, Result};
use secil_tree::{
    CatItem, CatSetData, ContextData, Flavor, LevelData, LevelRangeData, Payload, Ref, Spec, Tree,
};

/// A sensitivity with a category bitmap (bit = category value - 1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MlsLevel {
    pub sens: u32,
    pub cats: Bitmap,
}

/// A low/high pair of levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MlsRange {
    pub low: MlsLevel,
    pub high: MlsLevel,
}

/// A lowered security context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdbContext {
    pub user: u32,
    pub role: u32,
    pub ty: u32,
    /// Present only when the database is MLS.
    pub range: Option<MlsRange>,
}

fn datum_of(r: &Ref, what: &str) -> Result<secil_tree::DatumId> {
    r.datum().ok_or_else(|| {
        CompileError::new(
            ErrorKind::UnresolvedName,
            secil_base::Location::NONE,
            format!("{} reference was never resolved", what),
        )
    })
}

/// Expands a category set into a bitmap over database category values.
pub fn lower_catset(
    tree: &Tree,
    maps: &LowerMaps,
    data: &CatSetData,
    cats: &mut Bitmap,
) -> Result<()> {
    for item in &data.items {
        match item {
            CatItem::Name(r) => {
                let datum = datum_of(r, "category")?;
                match tree.datum_flavor(datum) {
                    Flavor::Cat | Flavor::CatAlias => {
                        cats.set((maps.value(tree, datum)? - 1) as usize);
                    }
                    Flavor::CatRange => {
                        let range_node = tree.datum(datum).primary();
                        match &tree.node(range_node).payload {
                            Payload::CatRange { data } => {
                                lower_catrange(tree, maps, &data.clone(), cats)?
                            }
                            _ => unreachable!("catrange datum has a catrange payload"),
                        }
                    }
                    Flavor::CatSet => {
                        let set_node = tree.datum(datum).primary();
                        match &tree.node(set_node).payload {
                            Payload::CatSet { data } => {
                                lower_catset(tree, maps, &data.clone(), cats)?
                            }
                            _ => unreachable!("catset datum has a catset payload"),
                        }
                    }
                    _ => unreachable!("resolver rejects other flavors in category sets"),
                }
            }
            CatItem::Range(range) => lower_catrange(tree, maps, range, cats)?,
        }
    }
    Ok(())
}

fn lower_catrange(
    tree: &Tree,
    maps: &LowerMaps,
    range: &secil_tree::CatRangeData,
    cats: &mut Bitmap,
) -> Result<()> {
    let low = maps.value(tree, datum_of(&range.low, "category")?)?;
    let high = maps.value(tree, datum_of(&range.high, "category")?)?;
    for value in low..=high {
        cats.set((value - 1) as usize);
    }
    Ok(())
}

fn level_spec_data<'a>(tree: &'a Tree, spec: &'a Spec<LevelData>) -> Result<&'a LevelData> {
    match spec {
        Spec::Inline(data) => Ok(data),
        Spec::Named(r) => {
            let datum = datum_of(r, "level")?;
            let node = tree.datum(datum).primary();
            match &tree.node(node).payload {
                Payload::Level { data } => Ok(data),
                _ => unreachable!("resolver checked the flavor"),
            }
        }
    }
}

/// Lowers a level: sensitivity value plus expanded categories.
pub fn lower_level(tree: &Tree, maps: &LowerMaps, data: &LevelData) -> Result<MlsLevel> {
    let sens_datum = datum_of(&data.sens, "sensitivity")?;
    let mut level = MlsLevel {
        sens: maps.value(tree, sens_datum)?,
        cats: Bitmap::new(),
    };
    if let Some(cats) = &data.cats {
        match cats {
            Spec::Inline(data) => lower_catset(tree, maps, data, &mut level.cats)?,
            Spec::Named(r) => {
                let datum = datum_of(r, "category set")?;
                let node = tree.datum(datum).primary();
                match &tree.node(node).payload {
                    Payload::CatSet { data } => {
                        lower_catset(tree, maps, &data.clone(), &mut level.cats)?
                    }
                    Payload::Cat | Payload::CatAlias { .. } => {
                        level.cats.set((maps.value(tree, datum)? - 1) as usize);
                    }
                    Payload::CatRange { data } => {
                        lower_catrange(tree, maps, &data.clone(), &mut level.cats)?
                    }
                    _ => unreachable!("resolver checked the flavor"),
                }
            }
        }
    }
    Ok(level)
}

fn level_spec(tree: &Tree, maps: &LowerMaps, spec: &Spec<LevelData>) -> Result<MlsLevel> {
    lower_level(tree, maps, level_spec_data(tree, spec)?)
}

/// Lowers a level range.
pub fn lower_levelrange(
    tree: &Tree,
    maps: &LowerMaps,
    spec: &Spec<LevelRangeData>,
) -> Result<MlsRange> {
    let data: &LevelRangeData = match spec {
        Spec::Inline(data) => data,
        Spec::Named(r) => {
            let datum = datum_of(r, "level range")?;
            let node = tree.datum(datum).primary();
            match &tree.node(node).payload {
                Payload::LevelRange { data } => data,
                _ => unreachable!("resolver checked the flavor"),
            }
        }
    };
    Ok(MlsRange {
        low: level_spec(tree, maps, &data.low)?,
        high: level_spec(tree, maps, &data.high)?,
    })
}

fn context_spec_data<'a>(tree: &'a Tree, spec: &'a Spec<ContextData>) -> Result<&'a ContextData> {
    match spec {
        Spec::Inline(data) => Ok(data),
        Spec::Named(r) => {
            let datum = datum_of(r, "context")?;
            let node = tree.datum(datum).primary();
            match &tree.node(node).payload {
                Payload::Context { data } => Ok(data),
                _ => unreachable!("resolver checked the flavor"),
            }
        }
    }
}

/// Lowers a context spec into database values.
pub fn lower_context(
    tree: &Tree,
    maps: &LowerMaps,
    mls: bool,
    spec: &Spec<ContextData>,
) -> Result<PdbContext> {
    let data = context_spec_data(tree, spec)?;
    let mut context = PdbContext {
        user: maps.value(tree, datum_of(&data.user, "user")?)?,
        role: maps.value(tree, datum_of(&data.role, "role")?)?,
        ty: maps.value(tree, datum_of(&data.ty, "type")?)?,
        range: None,
    };
    if mls {
        let range = data.range.as_ref().ok_or_else(|| {
            CompileError::new(
                ErrorKind::ParseInputMalformed,
                secil_base::Location::NONE,
                "context lacks a range in an mls policy",
            )
        })?;
        context.range = Some(lower_levelrange(tree, maps, range)?);
    }
    Ok(context)
}
