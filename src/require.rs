// This module implements the requirement resolver: the capability/extension/version
// lattice every instruction folds into as it is first observed during hoisting or
// numbering. Capability implication forms a DAG (Shader implies Matrix, Geometry
// implies Shader, and so on); the resolver computes the transitive closure from the
// DAG and folds against it, so the minimal set never depends on insertion order.
// Adding a capability that is already implied only lands in the all-seen set; adding
// one that is not removes everything it implies from the minimal set. Extensions form
// a flat set, and version bounds combine as max-of-minimums / min-of-maximums. The
// satisfiability check reports every unsupported capability/extension and any
// conflicting or unsupported version bound at once, before any output is produced.
// Per-instruction derivation lives here too: opcodes plus enumerated operand values
// (bit widths, storage classes, execution models, memory models, execution modes,
// linkage decorations) map to the requirements they impose.

//! Capability, extension and version requirements.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::{AssembleError, AssembleResult, UnsatisfiableReport};
use crate::inst::{Instruction, Opcode, Operand};
use crate::operands::{
    AddressingModel, Decoration, ExecutionModeKind, ExecutionModel, MemoryModelKind, StorageClass,
};
use crate::target::{Target, Version};

/// Capabilities the resolver models, with their real enumerant words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Matrix,
    Shader,
    Geometry,
    Tessellation,
    Addresses,
    Linkage,
    Kernel,
    Vector16,
    Float16Buffer,
    Float16,
    Float64,
    Int64,
    Int64Atomics,
    ImageBasic,
    Pipes,
    DeviceEnqueue,
    LiteralSampler,
    Int16,
    GenericPointer,
    Int8,
    SampledBuffer,
    ImageBuffer,
    VulkanMemoryModel,
}

impl Capability {
    /// Capabilities this one directly implies.
    pub fn implies(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Shader => &[Matrix],
            Geometry => &[Shader],
            Tessellation => &[Shader],
            Vector16 => &[Kernel],
            Float16Buffer => &[Kernel],
            Int64Atomics => &[Int64],
            ImageBasic => &[Kernel],
            Pipes => &[Kernel],
            DeviceEnqueue => &[Kernel],
            LiteralSampler => &[Kernel],
            GenericPointer => &[Addresses],
            ImageBuffer => &[SampledBuffer],
            _ => &[],
        }
    }

    /// Transitive closure of [`Capability::implies`], excluding `self`.
    pub fn closure(self) -> Vec<Capability> {
        let mut out = Vec::new();
        let mut work = self.implies().to_vec();
        while let Some(cap) = work.pop() {
            if !out.contains(&cap) {
                out.push(cap);
                work.extend_from_slice(cap.implies());
            }
        }
        out
    }

    /// Minimum format version this capability needs, if above the baseline.
    pub fn min_version(self) -> Option<Version> {
        match self {
            Capability::VulkanMemoryModel => Some(Version::V1_5),
            _ => None,
        }
    }

    pub fn from_u32(word: u32) -> Option<Self> {
        use Capability::*;
        Some(match word {
            0 => Matrix,
            1 => Shader,
            2 => Geometry,
            3 => Tessellation,
            4 => Addresses,
            5 => Linkage,
            6 => Kernel,
            7 => Vector16,
            8 => Float16Buffer,
            9 => Float16,
            10 => Float64,
            11 => Int64,
            12 => Int64Atomics,
            13 => ImageBasic,
            17 => Pipes,
            19 => DeviceEnqueue,
            20 => LiteralSampler,
            22 => Int16,
            38 => GenericPointer,
            39 => Int8,
            46 => SampledBuffer,
            47 => ImageBuffer,
            5345 => VulkanMemoryModel,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        use Capability::*;
        match self {
            Matrix => 0,
            Shader => 1,
            Geometry => 2,
            Tessellation => 3,
            Addresses => 4,
            Linkage => 5,
            Kernel => 6,
            Vector16 => 7,
            Float16Buffer => 8,
            Float16 => 9,
            Float64 => 10,
            Int64 => 11,
            Int64Atomics => 12,
            ImageBasic => 13,
            Pipes => 17,
            DeviceEnqueue => 19,
            LiteralSampler => 20,
            Int16 => 22,
            GenericPointer => 38,
            Int8 => 39,
            SampledBuffer => 46,
            ImageBuffer => 47,
            VulkanMemoryModel => 5345,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Requirements a single instruction imposes.
#[derive(Debug, Default)]
pub struct InstReq {
    pub capabilities: Vec<Capability>,
    pub extensions: Vec<String>,
    pub min_version: Option<Version>,
    pub max_version: Option<Version>,
}

impl InstReq {
    fn cap(mut self, cap: Capability) -> Self {
        self.capabilities.push(cap);
        self
    }

    fn at_least(mut self, version: Version) -> Self {
        self.min_version = Some(version);
        self
    }
}

/// Running requirement state for one module.
#[derive(Debug, Default)]
pub struct RequirementSet {
    /// Minimal capability set, in insertion order, none implied by another.
    minimal: Vec<Capability>,
    /// Every capability ever added, used only for validation.
    seen: HashSet<Capability>,
    extensions: BTreeSet<String>,
    min_version: Option<Version>,
    max_version: Option<Version>,
}

impl RequirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a capability into the minimal set.
    pub fn add_capability(&mut self, cap: Capability) {
        self.seen.insert(cap);
        if let Some(version) = cap.min_version() {
            self.require_at_least(version);
        }
        if self.is_implied(cap) {
            log::trace!("capability {cap} already implied, minimal set unchanged");
            return;
        }
        let implied = cap.closure();
        self.minimal.retain(|m| !implied.contains(m));
        self.minimal.push(cap);
    }

    pub fn add_extension(&mut self, ext: impl Into<String>) {
        self.extensions.insert(ext.into());
    }

    pub fn require_at_least(&mut self, version: Version) {
        self.min_version = Some(match self.min_version {
            Some(v) => v.max(version),
            None => version,
        });
    }

    pub fn require_at_most(&mut self, version: Version) {
        self.max_version = Some(match self.max_version {
            Some(v) => v.min(version),
            None => version,
        });
    }

    /// Whether `cap` is in the minimal set or implied by a member of it.
    pub fn is_implied(&self, cap: Capability) -> bool {
        self.minimal
            .iter()
            .any(|&m| m == cap || m.closure().contains(&cap))
    }

    /// Whether the module effectively requires `cap`, directly or transitively.
    pub fn includes(&self, cap: Capability) -> bool {
        self.seen.contains(&cap) || self.is_implied(cap)
    }

    /// Minimal capability set, insertion-ordered and deduplicated.
    pub fn minimal(&self) -> &[Capability] {
        &self.minimal
    }

    /// Every capability ever added, sorted by enumerant word.
    pub fn all_seen(&self) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self.seen.iter().copied().collect();
        caps.sort_by_key(|c| c.code());
        caps
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn min_version(&self) -> Option<Version> {
        self.min_version
    }

    pub fn max_version(&self) -> Option<Version> {
        self.max_version
    }

    /// Fold one instruction's derived requirements.
    pub fn fold(&mut self, req: InstReq) {
        for cap in req.capabilities {
            self.add_capability(cap);
        }
        for ext in req.extensions {
            self.add_extension(ext);
        }
        if let Some(v) = req.min_version {
            self.require_at_least(v);
        }
        if let Some(v) = req.max_version {
            self.require_at_most(v);
        }
    }

    /// Check everything against the target, reporting every unmet item.
    pub fn check_satisfiable(&self, target: &impl Target) -> AssembleResult<()> {
        let mut report = UnsatisfiableReport::default();

        let mut to_check: BTreeSet<Capability> = self.seen.iter().copied().collect();
        for &cap in &self.minimal {
            to_check.insert(cap);
            to_check.extend(cap.closure());
        }
        let mut unsupported: Vec<Capability> = to_check
            .into_iter()
            .filter(|&cap| !target.supports_capability(cap))
            .collect();
        unsupported.sort_by_key(|c| c.code());
        report.capabilities = unsupported;

        report.extensions = self
            .extensions
            .iter()
            .filter(|ext| !target.supports_extension(ext.as_str()))
            .cloned()
            .collect();

        match (self.min_version, self.max_version) {
            (Some(min), Some(max)) if min > max => {
                report.crossed_bounds = Some((min, max));
            }
            _ => {
                let version = target.version();
                let below = self.min_version.is_some_and(|min| version < min);
                let above = self.max_version.is_some_and(|max| version > max);
                if below || above {
                    report.unsupported_version =
                        Some((version, self.min_version, self.max_version));
                }
            }
        }

        if report.is_empty() {
            Ok(())
        } else {
            Err(AssembleError::Unsatisfiable(report))
        }
    }
}

fn int_operand(inst: &Instruction, idx: usize) -> Option<u64> {
    match inst.operands.get(idx) {
        Some(Operand::LitInt(value)) => Some(*value),
        _ => None,
    }
}

fn unknown(what: &'static str, value: u64, inst: &Instruction) -> AssembleError {
    AssembleError::UnknownEnumerant { what, value, opcode: inst.opcode.to_string() }
}

fn storage_class_req(inst: &Instruction, idx: usize) -> AssembleResult<InstReq> {
    let Some(word) = int_operand(inst, idx) else {
        return Ok(InstReq::default());
    };
    let storage = StorageClass::from_u32(word as u32)
        .ok_or_else(|| unknown("storage class", word, inst))?;
    Ok(match storage {
        StorageClass::Generic => InstReq::default().cap(Capability::GenericPointer),
        StorageClass::Uniform
        | StorageClass::Output
        | StorageClass::Private
        | StorageClass::PushConstant
        | StorageClass::StorageBuffer => InstReq::default().cap(Capability::Shader),
        _ => InstReq::default(),
    })
}

/// Derive the requirement an instruction imposes from its opcode and the
/// relevant operand values.
///
/// Enumerated values that must be understood here (capability words, storage
/// classes, execution models, memory models, execution modes) fail hard when
/// unknown; values only carried through (decorations) default to no
/// requirement.
pub fn requirements_of(inst: &Instruction) -> AssembleResult<InstReq> {
    let req = InstReq::default();
    Ok(match inst.opcode {
        Opcode::Capability => {
            let word = int_operand(inst, 0).unwrap_or(u64::MAX);
            let cap = Capability::from_u32(word as u32)
                .ok_or_else(|| unknown("capability", word, inst))?;
            req.cap(cap)
        }
        Opcode::Extension => {
            let mut req = req;
            if let Some(Operand::LitString(name)) = inst.operands.first() {
                req.extensions.push(name.clone());
            }
            req
        }
        Opcode::TypeInt => match int_operand(inst, 0) {
            Some(8) => req.cap(Capability::Int8),
            Some(16) => req.cap(Capability::Int16),
            Some(64) => req.cap(Capability::Int64),
            _ => req,
        },
        Opcode::TypeFloat => match int_operand(inst, 0) {
            Some(16) => req.cap(Capability::Float16),
            Some(64) => req.cap(Capability::Float64),
            _ => req,
        },
        Opcode::TypeMatrix => req.cap(Capability::Matrix),
        Opcode::TypePointer => storage_class_req(inst, 0)?,
        Opcode::TypeForwardPointer => {
            let mut fwd = storage_class_req(inst, 0)?;
            fwd.capabilities.push(Capability::Addresses);
            fwd
        }
        Opcode::Variable => storage_class_req(inst, 1)?,
        Opcode::ConstantSampler => req.cap(Capability::LiteralSampler),
        Opcode::EntryPoint => {
            let word = int_operand(inst, 0).unwrap_or(u64::MAX);
            let model = ExecutionModel::from_u32(word as u32)
                .ok_or_else(|| unknown("execution model", word, inst))?;
            match model {
                ExecutionModel::Vertex | ExecutionModel::Fragment | ExecutionModel::GlCompute => {
                    req.cap(Capability::Shader)
                }
                ExecutionModel::TessellationControl | ExecutionModel::TessellationEvaluation => {
                    req.cap(Capability::Tessellation)
                }
                ExecutionModel::Geometry => req.cap(Capability::Geometry),
                ExecutionModel::Kernel => req.cap(Capability::Kernel),
            }
        }
        Opcode::ExecutionMode => {
            let word = int_operand(inst, 1).unwrap_or(u64::MAX);
            let mode = ExecutionModeKind::from_u32(word as u32)
                .ok_or_else(|| unknown("execution mode", word, inst))?;
            match mode {
                ExecutionModeKind::Invocations => req.cap(Capability::Geometry),
                ExecutionModeKind::OriginUpperLeft | ExecutionModeKind::OriginLowerLeft => {
                    req.cap(Capability::Shader)
                }
                ExecutionModeKind::LocalSizeHint
                | ExecutionModeKind::VecTypeHint
                | ExecutionModeKind::ContractionOff => req.cap(Capability::Kernel),
                ExecutionModeKind::LocalSize => req,
            }
        }
        Opcode::MemoryModel => {
            let mut req = req;
            let addr_word = int_operand(inst, 0).unwrap_or(u64::MAX);
            let addressing = AddressingModel::from_u32(addr_word as u32)
                .ok_or_else(|| unknown("addressing model", addr_word, inst))?;
            if addressing != AddressingModel::Logical {
                req.capabilities.push(Capability::Addresses);
            }
            let mem_word = int_operand(inst, 1).unwrap_or(u64::MAX);
            let memory = MemoryModelKind::from_u32(mem_word as u32)
                .ok_or_else(|| unknown("memory model", mem_word, inst))?;
            match memory {
                MemoryModelKind::Glsl450 => req.cap(Capability::Shader),
                MemoryModelKind::OpenCl => req.cap(Capability::Kernel),
                MemoryModelKind::Vulkan => req.cap(Capability::VulkanMemoryModel),
                MemoryModelKind::Simple => req,
            }
        }
        Opcode::Decorate | Opcode::MemberDecorate => {
            let idx = if inst.opcode == Opcode::Decorate { 1 } else { 2 };
            match int_operand(inst, idx).and_then(|w| Decoration::from_u32(w as u32)) {
                Some(Decoration::LinkageAttributes) => req.cap(Capability::Linkage),
                _ => req,
            }
        }
        Opcode::ModuleProcessed => req.at_least(Version::V1_1),
        _ => req,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetEnv;

    #[test]
    fn test_minimality_with_implication() {
        // Shader implies Matrix: add Matrix then Shader.
        let mut set = RequirementSet::new();
        set.add_capability(Capability::Matrix);
        set.add_capability(Capability::Shader);

        assert_eq!(set.minimal(), &[Capability::Shader]);
        assert!(set.all_seen().contains(&Capability::Matrix));
        assert!(set.all_seen().contains(&Capability::Shader));
    }

    #[test]
    fn test_implied_addition_is_a_noop() {
        let mut set = RequirementSet::new();
        set.add_capability(Capability::Geometry);
        set.add_capability(Capability::Shader);
        set.add_capability(Capability::Matrix);
        assert_eq!(set.minimal(), &[Capability::Geometry]);
    }

    #[test]
    fn test_closure_is_transitive() {
        let closure = Capability::Geometry.closure();
        assert!(closure.contains(&Capability::Shader));
        assert!(closure.contains(&Capability::Matrix));
        assert!(!closure.contains(&Capability::Geometry));
    }

    #[test]
    fn test_version_bounds_combine() {
        let mut set = RequirementSet::new();
        set.require_at_least(Version::V1_1);
        set.require_at_least(Version::V1_3);
        set.require_at_most(Version::V1_5);
        set.require_at_most(Version::V1_4);
        assert_eq!(set.min_version(), Some(Version::V1_3));
        assert_eq!(set.max_version(), Some(Version::V1_4));
    }

    #[test]
    fn test_crossed_bounds_report_both() {
        let mut set = RequirementSet::new();
        set.require_at_least(Version::V1_4);
        set.require_at_most(Version::V1_0);
        let err = set.check_satisfiable(&TargetEnv::new(Version::V1_2)).unwrap_err();
        match err {
            AssembleError::Unsatisfiable(report) => {
                assert_eq!(report.crossed_bounds, Some((Version::V1_4, Version::V1_0)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_satisfiability_reports_all_unmet() {
        let mut set = RequirementSet::new();
        set.add_capability(Capability::Float64);
        set.add_capability(Capability::GenericPointer);
        set.add_extension("SPV_KHR_linkonce_odr");
        let target = TargetEnv::new(Version::V1_0);
        let err = set.check_satisfiable(&target).unwrap_err();
        match err {
            AssembleError::Unsatisfiable(report) => {
                // GenericPointer pulls Addresses in through the closure.
                assert_eq!(
                    report.capabilities,
                    vec![Capability::Addresses, Capability::Float64, Capability::GenericPointer]
                );
                assert_eq!(report.extensions, vec!["SPV_KHR_linkonce_odr".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_derive_int_widths() {
        let inst = Instruction::no_result(
            Opcode::TypeInt,
            vec![Operand::LitInt(64), Operand::LitInt(0)],
        );
        let req = requirements_of(&inst).unwrap();
        assert_eq!(req.capabilities, vec![Capability::Int64]);

        let inst = Instruction::no_result(
            Opcode::TypeInt,
            vec![Operand::LitInt(32), Operand::LitInt(1)],
        );
        assert!(requirements_of(&inst).unwrap().capabilities.is_empty());
    }

    #[test]
    fn test_derive_unknown_execution_model_is_fatal() {
        let inst = Instruction::no_result(Opcode::EntryPoint, vec![Operand::LitInt(99)]);
        assert!(matches!(
            requirements_of(&inst),
            Err(AssembleError::UnknownEnumerant { what: "execution model", .. })
        ));
    }

    #[test]
    fn test_derive_linkage_decoration() {
        let inst = Instruction::no_result(
            Opcode::Decorate,
            vec![
                Operand::global(4),
                Operand::LitInt(Decoration::LinkageAttributes.code() as u64),
                Operand::string("memcpy"),
                Operand::LitInt(1),
            ],
        );
        let req = requirements_of(&inst).unwrap();
        assert_eq!(req.capabilities, vec![Capability::Linkage]);
    }

    #[test]
    fn test_vulkan_memory_model_raises_min_version() {
        let mut set = RequirementSet::new();
        set.add_capability(Capability::VulkanMemoryModel);
        assert_eq!(set.min_version(), Some(Version::V1_5));
    }
}
