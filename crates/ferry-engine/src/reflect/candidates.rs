//! Member candidates
//!
//! A [`MemberCandidate`] is one callable shape of a member: a constructor, a
//! method, or one accessor of a property or field. Properties and fields are
//! expanded here into `get_`/`set_` accessors so the marshaling and invocation
//! layers only ever deal with parameter lists and a single invoke entry point.

use std::sync::Arc;

use ferry_sdk::{
    HostError, HostResult, MemberDescriptor, MemberKind, ObjectRef, ParameterDescriptor,
    TypeDescriptor, TypeKind, Value, VOID_TYPE,
};
use rustc_hash::FxHashSet;

use super::registry::TypeRegistry;
use crate::flags::{BindingFlags, MemberTypes};

/// Which entry point of a member a candidate uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessorRole {
    /// Constructor or method invoker
    Invoke,
    /// Property or field getter
    Get,
    /// Property or field setter
    Set,
}

/// One overload under consideration
#[derive(Clone)]
pub struct MemberCandidate {
    owner: Arc<TypeDescriptor>,
    index: usize,
    role: AccessorRole,
    parameters: Arc<[ParameterDescriptor]>,
}

impl std::fmt::Debug for MemberCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberCandidate")
            .field("owner", &self.owner.name)
            .field("signature", &self.signature())
            .finish()
    }
}

impl MemberCandidate {
    /// Candidate for member `index` of `owner`
    pub fn new(owner: Arc<TypeDescriptor>, index: usize, role: AccessorRole) -> Option<Self> {
        let member = owner.members.get(index)?;
        let mut parameters = member.parameters.clone();
        if role == AccessorRole::Set {
            parameters.push(ParameterDescriptor::new("value", member.value_type.clone()));
        }
        Some(Self {
            owner,
            index,
            role,
            parameters: parameters.into(),
        })
    }

    /// Stand-alone candidate for a synthesized member (used for call bindings)
    pub fn standalone(owner_name: &str, member: MemberDescriptor) -> Self {
        let mut owner = TypeDescriptor::new(owner_name, TypeKind::Class);
        let parameters: Arc<[ParameterDescriptor]> = member.parameters.clone().into();
        owner.members.push(member);
        Self {
            owner: Arc::new(owner),
            index: 0,
            role: AccessorRole::Invoke,
            parameters,
        }
    }

    /// Declaring type
    pub fn owner(&self) -> &Arc<TypeDescriptor> {
        &self.owner
    }

    /// Underlying member descriptor
    pub fn member(&self) -> &MemberDescriptor {
        &self.owner.members[self.index]
    }

    /// Entry point used by this candidate
    pub fn role(&self) -> AccessorRole {
        self.role
    }

    /// Member kind
    pub fn kind(&self) -> MemberKind {
        self.member().kind
    }

    /// Callable name: the member name, or `get_X`/`set_X` for accessors
    pub fn name(&self) -> String {
        let member = self.member();
        match self.role {
            AccessorRole::Invoke => member.name.clone(),
            AccessorRole::Get => format!("get_{}", member.name),
            AccessorRole::Set => format!("set_{}", member.name),
        }
    }

    /// Whether this candidate answers to `name`
    pub fn matches_name(&self, name: &str, ignore_case: bool) -> bool {
        let eq = |a: &str, b: &str| {
            if ignore_case {
                a.eq_ignore_ascii_case(b)
            } else {
                a == b
            }
        };
        eq(&self.member().name, name)
            || (self.role != AccessorRole::Invoke && eq(&self.name(), name))
    }

    /// Formal parameters, including the value parameter of setters
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Return type name
    pub fn return_type(&self) -> &str {
        match self.role {
            AccessorRole::Set => VOID_TYPE,
            _ => &self.member().value_type,
        }
    }

    /// Whether the member is static
    pub fn is_static(&self) -> bool {
        self.member().is_static
    }

    /// Whether a target object is required
    pub fn requires_target(&self) -> bool {
        !self.is_static() && self.kind() != MemberKind::Constructor
    }

    /// Number of by-reference parameters
    pub fn by_ref_count(&self) -> usize {
        self.parameters.iter().filter(|p| p.by_ref).count()
    }

    /// Human readable signature
    pub fn signature(&self) -> String {
        match self.role {
            AccessorRole::Invoke => self.member().signature(),
            _ => {
                let params = self
                    .parameters
                    .iter()
                    .map(|p| format!("{} {}", p.type_name, p.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{} {}({})", self.return_type(), self.name(), params)
            }
        }
    }

    /// Call the member with already-marshaled arguments
    pub fn invoke(&self, target: Option<&ObjectRef>, args: &mut [Value]) -> HostResult<Value> {
        let member = self.member();
        let entry = match self.role {
            AccessorRole::Invoke => member.invoker.as_ref(),
            AccessorRole::Get => member.getter.as_ref(),
            AccessorRole::Set => member.setter.as_ref(),
        };
        match entry {
            Some(f) => f(target, args),
            None => Err(HostError::not_supported(format!(
                "{} \"{}\" has no implementation",
                member.kind.as_str(),
                self.name()
            ))),
        }
    }
}

fn roles_for(member: &MemberDescriptor, flags: BindingFlags) -> Vec<AccessorRole> {
    let intents = BindingFlags::from_bits(flags.bits() & BindingFlags::INVOKE_MASK.bits());
    let any_intent = !intents.is_empty();
    match member.kind {
        MemberKind::Constructor => {
            if !any_intent || intents.contains(BindingFlags::CREATE_INSTANCE) {
                vec![AccessorRole::Invoke]
            } else {
                vec![]
            }
        }
        MemberKind::Method => {
            if !any_intent || intents.contains(BindingFlags::INVOKE_METHOD) {
                vec![AccessorRole::Invoke]
            } else {
                vec![]
            }
        }
        MemberKind::Property | MemberKind::Field => {
            let (get, set) = if member.kind == MemberKind::Property {
                (BindingFlags::GET_PROPERTY, BindingFlags::SET_PROPERTY)
            } else {
                (BindingFlags::GET_FIELD, BindingFlags::SET_FIELD)
            };
            let mut roles = Vec::with_capacity(2);
            if member.getter.is_some() && (!any_intent || intents.contains(get)) {
                roles.push(AccessorRole::Get);
            }
            if member.setter.is_some() && (!any_intent || intents.contains(set)) {
                roles.push(AccessorRole::Set);
            }
            roles
        }
    }
}

fn kind_selected(kind: MemberKind, member_types: MemberTypes) -> bool {
    let bit = match kind {
        MemberKind::Constructor => MemberTypes::CONSTRUCTOR,
        MemberKind::Method => MemberTypes::METHOD,
        MemberKind::Property => MemberTypes::PROPERTY,
        MemberKind::Field => MemberTypes::FIELD,
    };
    member_types.contains(bit)
}

fn visible(member: &MemberDescriptor, flags: BindingFlags, inherited: bool) -> bool {
    let visibility = if member.is_public {
        BindingFlags::PUBLIC
    } else {
        BindingFlags::NON_PUBLIC
    };
    if !flags.contains(visibility) {
        return false;
    }
    if member.kind == MemberKind::Constructor {
        return !inherited;
    }
    if member.is_static {
        flags.contains(BindingFlags::STATIC)
            && (!inherited || flags.contains(BindingFlags::FLATTEN_HIERARCHY))
    } else {
        flags.contains(BindingFlags::INSTANCE)
    }
}

fn shadow_key(member: &MemberDescriptor) -> String {
    let params: Vec<&str> = member
        .parameters
        .iter()
        .map(|p| p.type_name.as_str())
        .collect();
    format!("{:?}:{}({})", member.kind, member.name, params.join(","))
}

/// Gather every candidate of `ty` selected by kind and binding filter.
///
/// Members are returned in declaration order, derived types first. Inherited
/// members hidden by a derived member with the same signature are skipped;
/// constructors are never inherited.
pub fn gather(
    registry: &TypeRegistry,
    ty: &Arc<TypeDescriptor>,
    member_types: MemberTypes,
    flags: BindingFlags,
) -> Vec<MemberCandidate> {
    let chain = if flags.contains(BindingFlags::DECLARED_ONLY) {
        vec![ty.clone()]
    } else {
        registry.hierarchy(ty)
    };

    let mut seen = FxHashSet::default();
    let mut candidates = Vec::new();
    for (depth, owner) in chain.iter().enumerate() {
        let inherited = depth > 0;
        for (index, member) in owner.members.iter().enumerate() {
            if !kind_selected(member.kind, member_types) || !visible(member, flags, inherited) {
                continue;
            }
            if !seen.insert(shadow_key(member)) {
                continue;
            }
            for role in roles_for(member, flags) {
                if let Some(candidate) = MemberCandidate::new(owner.clone(), index, role) {
                    candidates.push(candidate);
                }
            }
        }
    }
    log::trace!(
        target: "ferry::reflect",
        "gathered {} candidates from {} ({:?}, {})",
        candidates.len(),
        ty.name,
        member_types,
        flags
    );
    candidates
}
