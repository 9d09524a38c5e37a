//! Overload resolution and invocation

use std::sync::Arc;

use ferry_sdk::{HostObject, ObjectRef, TypeDescriptor, Value, VOID_TYPE};

use super::boundary::call_guarded;
use crate::error::{EngineError, EngineResult};
use crate::flags::{
    BindingFlags, ByRefArgumentFlags, MarshalFlags, MemberTypes, ObjectFlags, ReorderFlags,
};
use crate::interp::Interpreter;
use crate::marshal::{fixup, materialize, CandidateMatch, MaterializeOptions, Materialized};
use crate::reflect::{gather, MemberCandidate};
use crate::settings::ObjectSettings;

/// Per-request resolution and marshaling policy
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeOptions {
    /// Member visibility filter and raw invocation intents
    pub binding_flags: BindingFlags,
    /// Member kinds to consider
    pub member_types: MemberTypes,
    /// Argument and result marshaling
    pub marshal_flags: MarshalFlags,
    /// By-reference write-back policy
    pub by_ref_flags: ByRefArgumentFlags,
    /// Ranking policy
    pub reorder_flags: ReorderFlags,
    /// Flags of handles created for results
    pub object_flags: ObjectFlags,
    /// More than one viable candidate is an error
    pub strict_member: bool,
    /// Argument count must equal parameter count
    pub strict_args: bool,
    /// Rank viable candidates by specificity
    pub reorder: bool,
    /// Member names ignore case
    pub no_case: bool,
    /// Treat by-reference parameters as by-value
    pub no_by_ref: bool,
    /// Report the viable members instead of invoking one
    pub no_invoke: bool,
    /// Log ranking and selection at debug level
    pub trace: bool,
    /// Explicit candidate index
    pub index: Option<usize>,
    /// Stop matching after this many viable candidates (0 = unlimited)
    pub limit: usize,
    /// Render results as text instead of handles
    pub to_string: bool,
    /// Name for the result handle
    pub object_name: Option<String>,
    /// Alias for the result handle
    pub alias: Option<String>,
    /// Hold one reference on newly created result handles until
    /// temporary references are released
    pub temporary: bool,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self::from_settings(&ObjectSettings::default())
    }
}

impl InvokeOptions {
    /// Options seeded from the `[object]` settings section
    pub fn from_settings(settings: &ObjectSettings) -> Self {
        Self {
            binding_flags: settings.binding_flags,
            member_types: MemberTypes::INVOCABLE,
            marshal_flags: settings.marshal_flags,
            by_ref_flags: settings.by_ref_flags,
            reorder_flags: settings.reorder_flags,
            object_flags: settings.object_flags,
            strict_member: settings.strict_member,
            strict_args: settings.strict_args,
            reorder: settings.reorder,
            no_case: settings.no_case,
            no_by_ref: false,
            no_invoke: false,
            trace: false,
            index: None,
            limit: 0,
            to_string: false,
            object_name: None,
            alias: None,
            temporary: false,
        }
    }

    fn ignore_case(&self) -> bool {
        self.no_case || self.binding_flags.contains(BindingFlags::IGNORE_CASE)
    }

    fn log_level(&self) -> log::Level {
        if self.trace || self.reorder_flags.contains(ReorderFlags::TRACE_RESULTS) {
            log::Level::Debug
        } else {
            log::Level::Trace
        }
    }
}

/// One resolution request
pub struct InvokeRequest<'a> {
    /// Type named in messages
    pub type_name: &'a str,
    /// Requested member name
    pub member: &'a str,
    /// Target object for instance members
    pub target: Option<ObjectRef>,
    /// Candidates to consider
    pub candidates: Vec<MemberCandidate>,
    /// Raw arguments
    pub args: &'a [String],
}

impl std::fmt::Debug for InvokeRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokeRequest")
            .field("type_name", &self.type_name)
            .field("member", &self.member)
            .field("target", &self.target.as_ref().map(|t| t.type_name().to_string()))
            .field("candidates", &self.candidates)
            .field("args", &self.args)
            .finish()
    }
}

/// Result of a resolution request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeOutcome {
    /// The member was invoked
    Value(Materialized),
    /// Signatures of the viable candidates (no-invoke mode)
    Members(Vec<String>),
}

impl InvokeOutcome {
    /// Script-visible text of the outcome
    pub fn text(&self) -> String {
        match self {
            InvokeOutcome::Value(m) => m.text.clone(),
            InvokeOutcome::Members(members) => crate::format::format_list(members),
        }
    }
}

/// Candidates of `ty` named `member`.
///
/// Without a target only static members and constructors qualify.
pub fn candidates_for(
    interp: &Interpreter,
    ty: &Arc<TypeDescriptor>,
    member: &str,
    has_target: bool,
    options: &InvokeOptions,
) -> Vec<MemberCandidate> {
    let ignore_case = options.ignore_case();
    gather(interp.types(), ty, options.member_types, options.binding_flags)
        .into_iter()
        .filter(|c| c.matches_name(member, ignore_case))
        .filter(|c| has_target || !c.requires_target())
        .collect()
}

fn describe_matches(matches: &[CandidateMatch]) -> String {
    matches
        .iter()
        .map(|m| format!("#{} cost={} {}", m.position, m.total_cost(), m.candidate.signature()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Resolve one overload and invoke it.
///
/// Runs argument fixup over every candidate, optionally ranks the survivors,
/// selects one, calls it inside the panic boundary, writes by-reference
/// results back to their variables, and materializes the return value.
pub fn resolve_and_invoke(
    interp: &Interpreter,
    request: InvokeRequest<'_>,
    options: &InvokeOptions,
) -> EngineResult<InvokeOutcome> {
    let level = options.log_level();
    let not_found = |errors| EngineError::MemberNotFound {
        type_name: request.type_name.to_string(),
        member: request.member.to_string(),
        errors,
    };

    if request.candidates.is_empty() {
        return Err(not_found(Vec::new()));
    }

    let mut ctx = interp.marshal_context();
    ctx.flags = options.marshal_flags;
    ctx.by_ref_flags = options.by_ref_flags;
    ctx.no_case = options.no_case;
    ctx.no_by_ref = options.no_by_ref;
    ctx.strict_args = options.strict_args;
    ctx.limit = options.limit;

    let result = fixup(&ctx, &request.candidates, request.args);
    let mut matches = result.matches;
    if matches.is_empty() {
        return Err(not_found(result.errors));
    }

    if options.reorder && matches.len() > 1 {
        log::log!(target: "ferry::invoke", level, "before reorder: {}", describe_matches(&matches));
        interp.binder().reorder(&mut matches, options.reorder_flags);
        log::log!(target: "ferry::invoke", level, "after reorder: {}", describe_matches(&matches));
    }

    if options.no_invoke {
        return Ok(InvokeOutcome::Members(
            matches.iter().map(|m| m.candidate.signature()).collect(),
        ));
    }

    let index = match options.index {
        Some(index) if index >= matches.len() => {
            return Err(EngineError::InvalidIndex {
                index,
                count: matches.len(),
            })
        }
        Some(index) => index,
        None if options.strict_member && matches.len() > 1 => {
            return Err(EngineError::AmbiguousMember {
                type_name: request.type_name.to_string(),
                member: request.member.to_string(),
                count: matches.len(),
            })
        }
        None => {
            let chosen = interp.binder().select(&matches);
            if chosen >= matches.len() {
                return Err(EngineError::InvalidIndex {
                    index: chosen,
                    count: matches.len(),
                });
            }
            chosen
        }
    };

    let mut chosen = matches.swap_remove(index);
    let signature = chosen.candidate.signature();
    log::log!(
        target: "ferry::invoke",
        level,
        "selected {} of {}: {}",
        index,
        matches.len() + 1,
        signature
    );

    let target = request.target.as_ref();
    let candidate = &chosen.candidate;
    let args = &mut chosen.args;
    let value = match call_guarded(|| candidate.invoke(target, args)) {
        Ok(value) => value,
        Err(source) => {
            let code = source.effective_code();
            interp.set_error(code, source.message.clone());
            log::debug!(target: "ferry::invoke", "{} failed: {}", signature, source);
            return Err(EngineError::InvocationFailed {
                member: signature,
                code,
                source,
            });
        }
    };

    write_back(interp, &chosen, options)?;

    let return_type = chosen.candidate.return_type().to_string();
    if return_type == VOID_TYPE {
        return Ok(InvokeOutcome::Value(Materialized::default()));
    }
    let materialize_options = MaterializeOptions {
        to_string: options.to_string,
        object_flags: options.object_flags,
        object_name: options.object_name.clone(),
        alias: options.alias.clone(),
        temporary: options.temporary,
    };
    materialize(
        interp.types(),
        interp.handles(),
        value,
        &return_type,
        options.marshal_flags,
        &materialize_options,
    )
    .map(InvokeOutcome::Value)
}

fn write_back(
    interp: &Interpreter,
    chosen: &CandidateMatch,
    options: &InvokeOptions,
) -> EngineResult<()> {
    let by_ref_flags = options.by_ref_flags;
    let materialize_options = MaterializeOptions {
        to_string: options.to_string || by_ref_flags.contains(ByRefArgumentFlags::TO_STRING),
        object_flags: options.object_flags,
        ..MaterializeOptions::default()
    };
    let mut first_error = None;

    for by_ref in &chosen.by_refs {
        if by_ref_flags.contains(ByRefArgumentFlags::EXISTING_ONLY) && !by_ref.existed {
            continue;
        }
        let Some(param) = chosen.candidate.parameters().get(by_ref.index) else {
            continue;
        };
        let value = chosen.args.get(by_ref.index).cloned().unwrap_or(Value::Null);
        let flags = options.marshal_flags.difference(MarshalFlags::ARRAY_AS_LINK)
            | MarshalFlags::ARRAY_AS_VALUE;
        let written = materialize(
            interp.types(),
            interp.handles(),
            value,
            &param.type_name,
            flags,
            &materialize_options,
        )
        .map_err(|e| e.to_string())
        .and_then(|m| interp.variables().set(&by_ref.variable, &m.text));

        if let Err(reason) = written {
            if by_ref_flags.contains(ByRefArgumentFlags::NO_COMPLAIN) {
                log::warn!(
                    target: "ferry::invoke",
                    "write-back to {} failed: {}",
                    by_ref.variable,
                    reason
                );
            } else if first_error.is_none() {
                first_error = Some(EngineError::ByRefWriteBackFailed {
                    variable: by_ref.variable.clone(),
                    reason,
                });
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::VariableStore;
    use crate::marshal::{BoxedValue, MatchQuality};
    use ferry_sdk::{
        param, FromValue, HostError, IntoValue, Number, ParameterDescriptor, TypeBuilder,
    };

    fn interp() -> Interpreter {
        let interp = Interpreter::default();
        interp
            .types()
            .register(
                TypeBuilder::class("Demo.Calc")
                    .static_method("F", vec![param("x", "System.Int32")], "System.String", |_, _| {
                        Ok("int".into_value())
                    })
                    .static_method("F", vec![param("x", "System.String")], "System.String", |_, _| {
                        Ok("string".into_value())
                    })
                    .static_method("G", vec![param("x", "System.Double")], "System.String", |_, _| {
                        Ok("double".into_value())
                    })
                    .static_method("G", vec![param("x", "System.Int64")], "System.String", |_, _| {
                        Ok("long".into_value())
                    })
                    .static_method(
                        "Twice",
                        vec![ParameterDescriptor::new("x", "System.Int32").by_ref()],
                        "System.Void",
                        |_, args| {
                            let x = i32::from_value(&args[0])?;
                            args[0] = Value::Number(Number::I32(x * 2));
                            Ok(Value::Null)
                        },
                    )
                    .static_method("Fail", vec![], "System.Void", |_, _| {
                        Err(HostError::failure("nope").with_code(42))
                    })
                    .static_method("Panic", vec![], "System.Void", |_, _| panic!("kaboom"))
                    .build(),
            )
            .unwrap();
        interp
    }

    fn call(
        interp: &Interpreter,
        member: &str,
        args: &[&str],
        options: &InvokeOptions,
    ) -> EngineResult<InvokeOutcome> {
        let ty = interp.types().get("Demo.Calc").unwrap();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let request = InvokeRequest {
            type_name: "Demo.Calc",
            member,
            target: None,
            candidates: candidates_for(interp, &ty, member, false, options),
            args: &args,
        };
        resolve_and_invoke(interp, request, options)
    }

    #[test]
    fn test_discovery_order_without_reorder() {
        let interp = interp();
        let options = InvokeOptions::default();
        for _ in 0..3 {
            let outcome = call(&interp, "F", &["42"], &options).unwrap();
            assert_eq!(outcome.text(), "int");
        }
    }

    #[test]
    fn test_reorder_prefers_exact() {
        let interp = interp();
        let mut options = InvokeOptions::default();
        assert_eq!(call(&interp, "G", &["42"], &options).unwrap().text(), "double");
        options.reorder = true;
        assert_eq!(call(&interp, "G", &["42"], &options).unwrap().text(), "long");
    }

    #[test]
    fn test_selection_errors() {
        let interp = interp();
        let mut options = InvokeOptions::default();
        options.strict_member = true;
        assert!(matches!(
            call(&interp, "F", &["42"], &options),
            Err(EngineError::AmbiguousMember { count: 2, .. })
        ));
        options.index = Some(1);
        assert_eq!(call(&interp, "F", &["42"], &options).unwrap().text(), "string");
        options.index = Some(5);
        assert!(matches!(
            call(&interp, "F", &["42"], &options),
            Err(EngineError::InvalidIndex { index: 5, count: 2 })
        ));
    }

    #[test]
    fn test_missing_member_and_mismatch() {
        let interp = interp();
        let options = InvokeOptions::default();
        match call(&interp, "Nope", &[], &options) {
            Err(EngineError::MemberNotFound { errors, .. }) => assert!(errors.is_empty()),
            other => panic!("unexpected {:?}", other),
        }
        match call(&interp, "G", &["abc"], &options) {
            Err(EngineError::MemberNotFound { errors, .. }) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_invoke_lists_members() {
        let interp = interp();
        let mut options = InvokeOptions::default();
        options.no_invoke = true;
        match call(&interp, "F", &["42"], &options).unwrap() {
            InvokeOutcome::Members(members) => assert_eq!(members.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_by_ref_write_back() {
        let interp = interp();
        interp.variables().set("n", "21").unwrap();
        call(&interp, "Twice", &["n"], &InvokeOptions::default()).unwrap();
        assert_eq!(interp.variables().get("n").as_deref(), Some("42"));
    }

    #[test]
    fn test_failures_set_error_state() {
        let interp = interp();
        let options = InvokeOptions::default();
        match call(&interp, "Fail", &[], &options) {
            Err(EngineError::InvocationFailed { code, .. }) => assert_eq!(code, 42),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(interp.error_state().code, 42);

        match call(&interp, "Panic", &[], &options) {
            Err(EngineError::InvocationFailed { source, .. }) => {
                assert_eq!(source.kind, ferry_sdk::HostErrorKind::Panic)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_match_quality_recorded() {
        let interp = interp();
        let ty = interp.types().get("Demo.Calc").unwrap();
        let options = InvokeOptions::default();
        let candidates = candidates_for(&interp, &ty, "G", false, &options);
        let ctx = interp.marshal_context();
        let result = fixup(&ctx, &candidates, &["42".to_string()]);
        assert_eq!(result.matches[0].qualities, vec![MatchQuality::Widened]);
        assert_eq!(result.matches[1].qualities, vec![MatchQuality::Exact]);
    }

    #[test]
    fn test_request_debug_names_target() {
        let boxed = BoxedValue::new("Demo.Boxed", Value::Number(Number::I32(3)));
        let target: ObjectRef = Arc::new(boxed);
        let args = vec!["1".to_string()];
        let request = InvokeRequest {
            type_name: "Demo.Boxed",
            member: "ToString",
            target: Some(target),
            candidates: Vec::new(),
            args: &args,
        };
        let text = format!("{:?}", request);
        assert!(text.contains("Some(\"Demo.Boxed\")"));
        assert!(text.contains("ToString"));
    }
}
