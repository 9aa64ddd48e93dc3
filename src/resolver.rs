//! Executable-candidate resolution: constructor and factory-method overload
//! selection via weighted type-distance scoring.
//!
//! Candidates are probed one by one with an explicit bound/unbound outcome
//! per candidate; binding failures are accumulated as suppressed causes and
//! only surfaced when no candidate succeeds. The winning executable and an
//! argument template are cached on the flattened descriptor — literal values
//! post-conversion, dynamic values (references, expressions, nested
//! descriptors, autowired lookups) as a prepared template that is re-fetched
//! fresh on every reuse.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, trace};

use crate::container::Container;
use crate::descriptor::{ArgumentDef, ArgumentSource};
use crate::error::{ContainerError, ContainerResult};
use crate::introspect::{ExecutableDescriptor, TypeRef};
use crate::merge::{ArgumentCacheState, MergedDescriptor};
use crate::producer::is_null_placeholder;
use crate::registry::Instance;
use crate::traits::{DependencyError, ParameterSite, TypeIntrospector};

/// Raw-match bias: a candidate matched on raw pre-conversion values beats a
/// candidate matched on converted values of equal nominal distance. Only the
/// ordering property matters, not the magnitude.
const RAW_MATCH_BIAS: i64 = 1024;

/// Max-penalty sentinel for disqualified candidates. Kept well below
/// `i64::MAX` so the raw bias can be subtracted without wrapping.
const MAX_WEIGHT: i64 = i64::MAX / 2;

/// The output of executable resolution: a chosen executable and its bound
/// argument arrays.
pub struct ConstructionPlan {
    /// The winning constructor or factory method.
    pub executable: ExecutableDescriptor,
    /// Argument values before type conversion.
    pub raw_args: Vec<Instance>,
    /// Argument values after conversion to the parameter types.
    pub converted_args: Vec<Instance>,
    /// True when any argument came from a dynamic source and must not be
    /// cached as a literal value.
    pub needs_re_resolution: bool,
}

/// Replay template for one cached argument position.
#[derive(Clone)]
pub(crate) enum PreparedArg {
    /// Re-resolve the declared source, then convert to the parameter type.
    Declared(ArgumentDef),
    /// Re-run the dependency lookup for this parameter.
    Autowired,
}

/// Where executable candidates come from.
pub(crate) enum CandidateSource<'a> {
    /// Constructors of the component's resolved type.
    Constructor(TypeRef),
    /// Methods of the given name on a factory owner type.
    Factory { owner_type: TypeRef, method: &'a str },
}

/// One declared argument with its source resolved to a raw value.
struct ResolvedArg {
    value: Instance,
    dynamic: bool,
    declared_type_name: Option<String>,
    name: Option<String>,
    def: ArgumentDef,
}

/// All declared arguments, resolved once before the candidate loop.
struct ResolvedValues {
    indexed: BTreeMap<usize, ResolvedArg>,
    generic: Vec<ResolvedArg>,
}

impl ResolvedValues {
    /// The minimum parameter count a candidate must accept: an indexed
    /// argument at position `k` implies at least `k + 1` parameters.
    fn min_arg_count(&self) -> usize {
        let total = self.indexed.len() + self.generic.len();
        let by_index = self.indexed.keys().max().map(|k| k + 1).unwrap_or(0);
        total.max(by_index)
    }

    /// Finds the declared value for one parameter position: index match
    /// first, then name match, then generic/untyped fallback. Generic values
    /// are each consumable by at most one parameter.
    fn find(
        &self,
        index: usize,
        param_name: Option<&str>,
        param_type_name: &str,
        used_generic: &mut HashSet<usize>,
    ) -> Option<&ResolvedArg> {
        if let Some(arg) = self.indexed.get(&index) {
            let type_ok = arg
                .declared_type_name
                .as_deref()
                .map(|t| t == param_type_name)
                .unwrap_or(true);
            let name_ok = match (arg.name.as_deref(), param_name) {
                (Some(declared), Some(actual)) => declared == actual,
                (Some(_), None) => false,
                (None, _) => true,
            };
            if type_ok && name_ok {
                return Some(arg);
            }
        }
        if let Some(param_name) = param_name {
            for (i, arg) in self.generic.iter().enumerate() {
                if used_generic.contains(&i) {
                    continue;
                }
                if arg.name.as_deref() == Some(param_name) {
                    used_generic.insert(i);
                    return Some(arg);
                }
            }
        }
        for (i, arg) in self.generic.iter().enumerate() {
            if used_generic.contains(&i) || arg.name.is_some() {
                continue;
            }
            let type_ok = arg
                .declared_type_name
                .as_deref()
                .map(|t| t == param_type_name)
                .unwrap_or(true);
            if type_ok {
                used_generic.insert(i);
                return Some(arg);
            }
        }
        None
    }
}

/// Fully-bound arguments for one candidate.
struct BoundArgs {
    raw: Vec<Instance>,
    converted: Vec<Instance>,
    prepared: Vec<PreparedArg>,
    needs_re_resolution: bool,
}

impl BoundArgs {
    fn type_diff_weight(
        introspector: &dyn TypeIntrospector,
        param_types: &[TypeRef],
        values: &[Instance],
    ) -> i64 {
        let mut weight = 0i64;
        for (value, param_type) in values.iter().zip(param_types) {
            if is_null_placeholder(value) {
                continue;
            }
            let distance = introspector
                .type_of_value(value)
                .and_then(|vt| introspector.assignment_distance(vt, *param_type));
            match distance {
                Some(d) => weight += i64::from(d),
                None => return MAX_WEIGHT,
            }
        }
        weight
    }

    fn all_assignable(
        introspector: &dyn TypeIntrospector,
        param_types: &[TypeRef],
        values: &[Instance],
    ) -> bool {
        values.iter().zip(param_types).all(|(value, param_type)| {
            is_null_placeholder(value)
                || introspector
                    .type_of_value(value)
                    .and_then(|vt| introspector.assignment_distance(vt, *param_type))
                    .is_some()
        })
    }

    /// Lenient weight: the better of the converted-value distance and the
    /// raw-value distance minus the raw-match bias, so a raw exact match
    /// wins ties against conversions.
    fn lenient_weight(&self, introspector: &dyn TypeIntrospector, param_types: &[TypeRef]) -> i64 {
        let converted = Self::type_diff_weight(introspector, param_types, &self.converted);
        let raw = Self::type_diff_weight(introspector, param_types, &self.raw) - RAW_MATCH_BIAS;
        converted.min(raw)
    }

    /// Strict weight: both converted and raw values must be fully assignable
    /// or the candidate is disqualified with a max-penalty sentinel.
    fn strict_weight(&self, introspector: &dyn TypeIntrospector, param_types: &[TypeRef]) -> i64 {
        if !Self::all_assignable(introspector, param_types, &self.converted) {
            return MAX_WEIGHT;
        }
        if !Self::all_assignable(introspector, param_types, &self.raw) {
            return MAX_WEIGHT - 512;
        }
        0
    }
}

/// Per-request resolver over the container's collaborators.
pub(crate) struct ExecutableResolver<'a> {
    container: &'a Container,
}

impl<'a> ExecutableResolver<'a> {
    pub(crate) fn new(container: &'a Container) -> Self {
        ExecutableResolver { container }
    }

    /// Selects the best-matching executable for `name` and produces concrete
    /// argument arrays, consulting and maintaining the plan cache on the
    /// flattened descriptor.
    pub(crate) fn resolve(
        &self,
        name: &str,
        md: &MergedDescriptor,
        source: CandidateSource<'_>,
        explicit: Option<&[Instance]>,
    ) -> ContainerResult<ConstructionPlan> {
        let introspector = self.container.introspector();

        if explicit.is_none() {
            enum Cached {
                Complete(ConstructionPlan),
                Partial(ExecutableDescriptor, Vec<PreparedArg>),
            }
            let cached = {
                let cache = md.cache.lock();
                match (&cache.executable, &cache.arguments) {
                    (Some(executable), ArgumentCacheState::Resolved { raw, converted }) => {
                        Some(Cached::Complete(ConstructionPlan {
                            executable: executable.clone(),
                            raw_args: raw.clone(),
                            converted_args: converted.clone(),
                            needs_re_resolution: false,
                        }))
                    }
                    (Some(executable), ArgumentCacheState::Prepared(prepared)) => {
                        Some(Cached::Partial(executable.clone(), prepared.clone()))
                    }
                    _ => None,
                }
            };
            match cached {
                Some(Cached::Complete(plan)) => {
                    trace!(component = name, "construction plan cache hit");
                    return Ok(plan);
                }
                Some(Cached::Partial(executable, prepared)) => {
                    trace!(
                        component = name,
                        "re-resolving dynamic arguments for cached executable"
                    );
                    return self.replay_prepared(name, md, executable, prepared);
                }
                None => {}
            }
        }

        // An executable carried forward across a stale recompute (or left by
        // an earlier resolution) pins the candidate set, so discovery is not
        // re-paid.
        let mut candidates = match md.cache.lock().executable.clone() {
            Some(executable) => vec![executable],
            None => match &source {
                CandidateSource::Constructor(t) => introspector.constructors(*t),
                CandidateSource::Factory { owner_type, method } => {
                    introspector.factory_methods(*owner_type, method)
                }
            },
        };
        if candidates.is_empty() {
            let what = match &source {
                CandidateSource::Constructor(t) => {
                    format!("no visible constructors on type '{}'", introspector.type_name(*t))
                }
                CandidateSource::Factory { owner_type, method } => format!(
                    "no method named '{}' on factory type '{}'",
                    method,
                    introspector.type_name(*owner_type)
                ),
            };
            return Err(ContainerError::Unsatisfied {
                name: name.to_string(),
                reason: what,
                suppressed: Vec::new(),
            });
        }

        // Common case: a single no-argument candidate with nothing declared
        // short-circuits the whole algorithm.
        if candidates.len() == 1
            && explicit.is_none()
            && md.arguments.is_empty()
            && candidates[0].param_count() == 0
        {
            let plan = ConstructionPlan {
                executable: candidates[0].clone(),
                raw_args: Vec::new(),
                converted_args: Vec::new(),
                needs_re_resolution: false,
            };
            self.store_plan(
                md,
                &plan.executable,
                &BoundArgs {
                    raw: Vec::new(),
                    converted: Vec::new(),
                    prepared: Vec::new(),
                    needs_re_resolution: false,
                },
            );
            return Ok(plan);
        }

        let declared = match explicit {
            Some(_) => None,
            None => Some(self.resolve_declared_values(name, md)?),
        };
        let min_args = match (explicit, &declared) {
            (Some(explicit), _) => explicit.len(),
            (None, Some(declared)) => declared.min_arg_count(),
            (None, None) => 0,
        };

        // Greedy-first ordering: descending parameter count, public before
        // non-public. Once a match binds more arguments than any remaining
        // candidate accepts, the search ends.
        candidates.sort_by(|a, b| {
            b.param_count()
                .cmp(&a.param_count())
                .then(b.public.cmp(&a.public))
        });

        let single_candidate = candidates.len() == 1;
        let mut best: Option<(BoundArgs, ExecutableDescriptor)> = None;
        let mut best_weight = i64::MAX;
        let mut ambiguous: Vec<ExecutableDescriptor> = Vec::new();
        let mut suppressed: Vec<String> = Vec::new();

        for candidate in &candidates {
            if let Some((bound, _)) = &best {
                if bound.converted.len() > candidate.param_count() {
                    break;
                }
            }
            if candidate.param_count() < min_args {
                continue;
            }
            let outcome = match explicit {
                Some(explicit) => Self::bind_explicit(candidate, explicit),
                None => self.bind_declared(
                    name,
                    md,
                    candidate,
                    declared.as_ref().expect("declared values resolved"),
                    single_candidate,
                ),
            };
            match outcome {
                Ok(bound) => {
                    let weight = if md.lenient_binding {
                        bound.lenient_weight(introspector, &candidate.param_types)
                    } else {
                        bound.strict_weight(introspector, &candidate.param_types)
                    };
                    if weight < best_weight {
                        best = Some((bound, candidate.clone()));
                        best_weight = weight;
                        ambiguous.clear();
                    } else if best.is_some() && weight == best_weight {
                        ambiguous.push(candidate.clone());
                    }
                }
                Err(reason) => {
                    suppressed.push(format!(
                        "{}: {}",
                        introspector.describe_executable(candidate),
                        reason
                    ));
                }
            }
        }

        let Some((bound, winner)) = best else {
            let reason = suppressed.pop().unwrap_or_else(|| {
                format!(
                    "no executable among {} candidate(s) accepts {} argument(s)",
                    candidates.len(),
                    min_args
                )
            });
            return Err(ContainerError::Unsatisfied {
                name: name.to_string(),
                reason,
                suppressed,
            });
        };

        if !ambiguous.is_empty() && !md.lenient_binding {
            let mut rendered = vec![introspector.describe_executable(&winner)];
            rendered.extend(
                ambiguous
                    .iter()
                    .map(|c| introspector.describe_executable(c)),
            );
            return Err(ContainerError::Ambiguous {
                name: name.to_string(),
                candidates: rendered,
            });
        }

        debug!(
            component = name,
            executable = %introspector.describe_executable(&winner),
            weight = best_weight,
            "executable selected"
        );

        if explicit.is_none() {
            self.store_plan(md, &winner, &bound);
        }
        Ok(ConstructionPlan {
            executable: winner,
            raw_args: bound.raw,
            converted_args: bound.converted,
            needs_re_resolution: bound.needs_re_resolution,
        })
    }

    /// Resolves every declared argument source to a raw value, once, before
    /// the candidate loop. Failures here (a dangling reference, a failing
    /// expression) are fatal, not per-candidate.
    fn resolve_declared_values(
        &self,
        name: &str,
        md: &MergedDescriptor,
    ) -> ContainerResult<ResolvedValues> {
        let mut indexed = BTreeMap::new();
        for (index, def) in &md.arguments.indexed {
            let (value, dynamic) = self.resolve_source(name, md, def)?;
            indexed.insert(
                *index,
                ResolvedArg {
                    value,
                    dynamic,
                    declared_type_name: def.declared_type_name.clone(),
                    name: def.name.clone(),
                    def: def.clone(),
                },
            );
        }
        let mut generic = Vec::new();
        for def in &md.arguments.generic {
            let (value, dynamic) = self.resolve_source(name, md, def)?;
            generic.push(ResolvedArg {
                value,
                dynamic,
                declared_type_name: def.declared_type_name.clone(),
                name: def.name.clone(),
                def: def.clone(),
            });
        }
        Ok(ResolvedValues { indexed, generic })
    }

    fn resolve_source(
        &self,
        _name: &str,
        md: &MergedDescriptor,
        def: &ArgumentDef,
    ) -> ContainerResult<(Instance, bool)> {
        match &def.source {
            ArgumentSource::Literal(value) => Ok((value.clone(), false)),
            ArgumentSource::Reference(target) => Ok((self.container.get(target)?, true)),
            ArgumentSource::Expression(expr) => {
                Ok((self.container.evaluate_expression(expr, &md.name)?, true))
            }
            ArgumentSource::Inner(inner) => {
                Ok((self.container.create_nested(md, inner)?, true))
            }
        }
    }

    fn bind_explicit(
        candidate: &ExecutableDescriptor,
        explicit: &[Instance],
    ) -> Result<BoundArgs, String> {
        if candidate.param_count() != explicit.len() {
            return Err(format!(
                "takes {} parameter(s), {} explicit argument(s) supplied",
                candidate.param_count(),
                explicit.len()
            ));
        }
        Ok(BoundArgs {
            raw: explicit.to_vec(),
            converted: explicit.to_vec(),
            prepared: Vec::new(),
            needs_re_resolution: false,
        })
    }

    /// Binds every parameter of one candidate, or reports why it cannot be
    /// bound. Binding failures skip the candidate rather than failing the
    /// resolution, except via suppressed-cause accumulation in the caller.
    fn bind_declared(
        &self,
        name: &str,
        md: &MergedDescriptor,
        candidate: &ExecutableDescriptor,
        declared: &ResolvedValues,
        single_candidate: bool,
    ) -> Result<BoundArgs, String> {
        let introspector = self.container.introspector();
        let converter = self.container.converter();
        let mut used_generic = HashSet::new();
        let mut raw = Vec::with_capacity(candidate.param_count());
        let mut converted = Vec::with_capacity(candidate.param_count());
        let mut prepared = Vec::with_capacity(candidate.param_count());
        let mut needs_re_resolution = false;

        for index in 0..candidate.param_count() {
            let param_type = candidate.param_types[index];
            let param_name = candidate.param_name(index);
            let param_type_name = introspector.type_name(param_type);
            if let Some(arg) =
                declared.find(index, param_name, &param_type_name, &mut used_generic)
            {
                let converted_value = converter
                    .convert(&arg.value, param_type, introspector)
                    .map_err(|e| format!("parameter {}: {}", index, e))?;
                raw.push(arg.value.clone());
                converted.push(converted_value);
                prepared.push(PreparedArg::Declared(arg.def.clone()));
                needs_re_resolution |= arg.dynamic;
            } else if md.autowire_args {
                let site = ParameterSite {
                    executable: candidate,
                    index,
                    param_type,
                    param_name,
                };
                match self.container.dependency_resolver().resolve(
                    self.container,
                    &site,
                    name,
                    None,
                    converter,
                ) {
                    Ok(value) => {
                        raw.push(value.clone());
                        converted.push(value);
                        prepared.push(PreparedArg::Autowired);
                        needs_re_resolution = true;
                    }
                    Err(DependencyError::NotFound(_))
                        if single_candidate && introspector.is_collection_like(param_type) =>
                    {
                        // Last-resort fallback: a missing dependency for a
                        // collection-shaped parameter degrades to empty.
                        let empty = introspector.empty_collection(param_type).ok_or_else(|| {
                            format!("parameter {}: no empty value for '{}'", index, param_type_name)
                        })?;
                        raw.push(empty.clone());
                        converted.push(empty);
                        prepared.push(PreparedArg::Autowired);
                        needs_re_resolution = true;
                    }
                    Err(err) => {
                        return Err(format!("parameter {}: {}", index, err));
                    }
                }
            } else {
                return Err(format!(
                    "no declared value for parameter {} of type '{}'",
                    index, param_type_name
                ));
            }
        }
        Ok(BoundArgs {
            raw,
            converted,
            prepared,
            needs_re_resolution,
        })
    }

    /// Re-derives only the argument values for an already-chosen executable,
    /// re-fetching dynamic sources and reusing the cached selection.
    fn replay_prepared(
        &self,
        name: &str,
        md: &MergedDescriptor,
        executable: ExecutableDescriptor,
        prepared: Vec<PreparedArg>,
    ) -> ContainerResult<ConstructionPlan> {
        let introspector = self.container.introspector();
        let converter = self.container.converter();
        let mut raw = Vec::with_capacity(prepared.len());
        let mut converted = Vec::with_capacity(prepared.len());

        for (index, prep) in prepared.iter().enumerate() {
            let param_type = executable.param_types[index];
            match prep {
                PreparedArg::Declared(def) => {
                    let (value, _) = self.resolve_source(name, md, def)?;
                    let converted_value = converter.convert(&value, param_type, introspector)?;
                    raw.push(value);
                    converted.push(converted_value);
                }
                PreparedArg::Autowired => {
                    let site = ParameterSite {
                        executable: &executable,
                        index,
                        param_type,
                        param_name: executable.param_name(index),
                    };
                    match self.container.dependency_resolver().resolve(
                        self.container,
                        &site,
                        name,
                        None,
                        converter,
                    ) {
                        Ok(value) => {
                            raw.push(value.clone());
                            converted.push(value);
                        }
                        Err(DependencyError::NotFound(_))
                            if introspector.is_collection_like(param_type) =>
                        {
                            let empty =
                                introspector.empty_collection(param_type).ok_or_else(|| {
                                    ContainerError::Unsatisfied {
                                        name: name.to_string(),
                                        reason: format!(
                                            "parameter {}: no empty value for collection parameter",
                                            index
                                        ),
                                        suppressed: Vec::new(),
                                    }
                                })?;
                            raw.push(empty.clone());
                            converted.push(empty);
                        }
                        Err(err) => {
                            return Err(ContainerError::Unsatisfied {
                                name: name.to_string(),
                                reason: format!("parameter {}: {}", index, err),
                                suppressed: Vec::new(),
                            });
                        }
                    }
                }
            }
        }
        Ok(ConstructionPlan {
            executable,
            raw_args: raw,
            converted_args: converted,
            needs_re_resolution: true,
        })
    }

    fn store_plan(&self, md: &MergedDescriptor, executable: &ExecutableDescriptor, bound: &BoundArgs) {
        let mut cache = md.cache.lock();
        cache.executable = Some(executable.clone());
        cache.arguments = if bound.needs_re_resolution {
            ArgumentCacheState::Prepared(bound.prepared.clone())
        } else {
            ArgumentCacheState::Resolved {
                raw: bound.raw.clone(),
                converted: bound.converted.clone(),
            }
        };
    }
}
