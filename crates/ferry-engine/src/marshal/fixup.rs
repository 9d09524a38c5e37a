//! Argument fixup across a candidate list

use ferry_sdk::{ParameterDescriptor, Value};

use super::coerce::{coerce_with_base, default_value};
use super::{ByRefArgument, CandidateMatch, MarshalContext, MatchQuality};
use crate::error::CoercionError;
use crate::flags::MarshalFlags;
use crate::reflect::MemberCandidate;

/// Viable candidates and the reasons the others were dropped
#[derive(Debug, Default)]
pub struct FixupResult {
    /// Candidates that accepted the arguments, in discovery order
    pub matches: Vec<CandidateMatch>,
    /// One error per rejected candidate
    pub errors: Vec<CoercionError>,
}

/// Coerce `raw_args` against every candidate.
///
/// Has no side effects: by-reference variables are only read.
pub fn fixup(
    ctx: &MarshalContext<'_>,
    candidates: &[MemberCandidate],
    raw_args: &[String],
) -> FixupResult {
    let mut result = FixupResult::default();
    for (position, candidate) in candidates.iter().enumerate() {
        if ctx.limit > 0 && result.matches.len() >= ctx.limit {
            break;
        }
        match match_candidate(ctx, candidate, raw_args) {
            Ok((args, by_refs, qualities)) => {
                log::trace!(
                    target: "ferry::marshal",
                    "candidate {} accepted: {} {:?}",
                    position,
                    candidate.signature(),
                    qualities
                );
                result.matches.push(CandidateMatch {
                    candidate: candidate.clone(),
                    args,
                    by_refs,
                    qualities,
                    position,
                });
            }
            Err(error) => {
                log::trace!(target: "ferry::marshal", "candidate {} rejected: {}", position, error);
                result.errors.push(error);
            }
        }
    }
    result
}

type Matched = (Vec<Value>, Vec<ByRefArgument>, Vec<MatchQuality>);

fn match_candidate(
    ctx: &MarshalContext<'_>,
    candidate: &MemberCandidate,
    raw_args: &[String],
) -> Result<Matched, CoercionError> {
    let params = candidate.parameters();
    let signature = candidate.signature();
    let arity = |reason: String| CoercionError::new(signature.clone(), raw_args.len(), "*", reason);

    if raw_args.len() > params.len() {
        return Err(arity(format!(
            "too many arguments: expected {} but got {}",
            params.len(),
            raw_args.len()
        )));
    }
    if raw_args.len() < params.len() {
        let defaults_allowed = ctx.flags.contains(MarshalFlags::DEFAULT_VALUE) && !ctx.strict_args;
        let missing_default = params[raw_args.len()..].iter().any(|p| p.default.is_none());
        if !defaults_allowed || missing_default {
            return Err(arity(format!(
                "not enough arguments: expected {} but got {}",
                params.len(),
                raw_args.len()
            )));
        }
    }

    let mut args = Vec::with_capacity(params.len());
    let mut by_refs = Vec::new();
    let mut qualities = Vec::with_capacity(params.len());

    for (index, param) in params.iter().enumerate() {
        let Some(raw) = raw_args.get(index) else {
            args.push(param.default.clone().unwrap_or_default());
            qualities.push(MatchQuality::Exact);
            continue;
        };
        let fail = |reason: String| {
            CoercionError::new(signature.clone(), index, param.name.clone(), reason)
        };

        let linked =
            param.type_name.ends_with("[]") && ctx.flags.contains(MarshalFlags::ARRAY_AS_LINK);
        if param.by_ref && !ctx.no_by_ref {
            let existing = ctx.variables.get(raw);
            let (value, quality) = by_ref_value(ctx, param, existing.as_deref()).map_err(|reason| {
                fail(format!("{} (variable \"{}\")", reason, raw))
            })?;
            by_refs.push(ByRefArgument {
                index,
                variable: raw.clone(),
                existed: existing.is_some(),
            });
            args.push(value);
            qualities.push(quality);
        } else if linked && ctx.variables.exists(raw) {
            let text = ctx.variables.get(raw).unwrap_or_default();
            let (value, quality) =
                coerce_with_base(ctx, &text, &param.type_name, param.default.as_ref())
                    .map_err(fail)?;
            by_refs.push(ByRefArgument {
                index,
                variable: raw.clone(),
                existed: true,
            });
            args.push(value);
            qualities.push(quality);
        } else {
            let (value, quality) =
                coerce_with_base(ctx, raw, &param.type_name, param.default.as_ref()).map_err(fail)?;
            args.push(value);
            qualities.push(quality);
        }
    }

    Ok((args, by_refs, qualities))
}

fn by_ref_value(
    ctx: &MarshalContext<'_>,
    param: &ParameterDescriptor,
    existing: Option<&str>,
) -> Result<(Value, MatchQuality), String> {
    if param.is_out {
        return Ok((default_value(ctx.types, &param.type_name), MatchQuality::Exact));
    }
    match existing {
        Some(text) => coerce_with_base(ctx, text, &param.type_name, param.default.as_ref()),
        None => Err("variable does not exist".to_string()),
    }
}
