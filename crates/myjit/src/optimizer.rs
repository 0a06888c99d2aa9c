//! IR optimization pipeline run over each function before code generation.
//!
//! A [`Pipeline`] is an ordered list of named [`Pass`]es. Each pass lowers
//! onto one of Cranelift's mid-end transformations:
//!
//! ```text
//! instcombine, reassociate, gvn  ->  e-graph rewrite
//! simplifycfg                    ->  unreachable-code removal + constant-phi removal
//! mem2reg                        ->  redundant load forwarding
//! adce                           ->  unreachable-code removal + e-graph elaboration
//! ```
//!
//! Elaboration out of the e-graph only materializes values that something
//! uses, so the rewrite that follows unreachable-code removal is what drops
//! dead pure instructions.
//!
//! Adjacent passes that lower to the same transformation run it once, so
//! the default pipeline executes six steps for its eight passes.

use std::fmt;
use std::str::FromStr;

use cranelift_codegen::CodegenResult;
use cranelift_codegen::Context;
use cranelift_codegen::control::ControlPlane;
use cranelift_codegen::isa::TargetIsa;

use crate::error::SessionError;

// ─── Passes ──────────────────────────────────────────────────────────

/// A named optimization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Peephole instruction combining.
    InstCombine,
    /// Reassociation of commutative expressions.
    Reassociate,
    /// Global value numbering.
    Gvn,
    /// Control-flow graph simplification.
    SimplifyCfg,
    /// Promote memory traffic to SSA values.
    PromoteMemToReg,
    /// Aggressive dead code elimination.
    AggressiveDce,
}

impl Pass {
    pub const ALL: [Pass; 6] = [
        Pass::InstCombine,
        Pass::Reassociate,
        Pass::Gvn,
        Pass::SimplifyCfg,
        Pass::PromoteMemToReg,
        Pass::AggressiveDce,
    ];

    /// Short name used in configuration strings.
    pub const fn name(self) -> &'static str {
        match self {
            Pass::InstCombine => "instcombine",
            Pass::Reassociate => "reassociate",
            Pass::Gvn => "gvn",
            Pass::SimplifyCfg => "simplifycfg",
            Pass::PromoteMemToReg => "mem2reg",
            Pass::AggressiveDce => "adce",
        }
    }

    const fn step(self) -> Step {
        match self {
            Pass::InstCombine | Pass::Reassociate | Pass::Gvn => Step::Rewrite,
            Pass::SimplifyCfg => Step::SimplifyCfg,
            Pass::PromoteMemToReg => Step::ForwardLoads,
            Pass::AggressiveDce => Step::Dce,
        }
    }
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pass {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Pass::ALL
            .into_iter()
            .find(|pass| pass.name() == wanted)
            .ok_or(SessionError::UnknownPass(wanted))
    }
}

/// Cranelift transformation a pass lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Rewrite,
    SimplifyCfg,
    ForwardLoads,
    Dce,
}

// ─── Pipeline ────────────────────────────────────────────────────────

/// Ordered optimization passes applied to every defined function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    passes: Vec<Pass>,
}

impl Pipeline {
    pub fn new(passes: impl IntoIterator<Item = Pass>) -> Self {
        Self {
            passes: passes.into_iter().collect(),
        }
    }

    /// A pipeline that leaves the IR untouched.
    pub fn none() -> Self {
        Self { passes: Vec::new() }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Lower the passes onto Cranelift steps, merging adjacent duplicates.
    pub(crate) fn steps(&self) -> Vec<Step> {
        let mut steps: Vec<Step> = Vec::with_capacity(self.passes.len());
        for pass in &self.passes {
            let step = pass.step();
            if steps.last() != Some(&step) {
                steps.push(step);
            }
        }
        steps
    }

    /// Run the pipeline over the function held by `ctx`.
    ///
    /// The function is legalized for `isa` first; the CFG and dominator tree
    /// are recomputed before every step.
    pub(crate) fn run(&self, ctx: &mut Context, isa: &dyn TargetIsa) -> CodegenResult<()> {
        if self.passes.is_empty() {
            return Ok(());
        }

        ctx.compute_cfg();
        ctx.legalize(isa)?;

        let mut ctrl_plane = ControlPlane::default();
        for step in self.steps() {
            ctx.compute_cfg();
            ctx.compute_domtree();
            tracing::trace!(?step, "Running optimization step");
            match step {
                Step::Rewrite => ctx.egraph_pass(isa, &mut ctrl_plane)?,
                Step::SimplifyCfg => {
                    ctx.eliminate_unreachable_code(isa)?;
                    ctx.compute_cfg();
                    ctx.compute_domtree();
                    ctx.remove_constant_phis(isa)?;
                }
                Step::ForwardLoads => ctx.replace_redundant_loads()?,
                Step::Dce => {
                    ctx.eliminate_unreachable_code(isa)?;
                    ctx.compute_cfg();
                    ctx.compute_domtree();
                    ctx.egraph_pass(isa, &mut ctrl_plane)?;
                }
            }
        }
        Ok(())
    }
}

impl Default for Pipeline {
    /// instcombine, reassociate, gvn, simplifycfg, mem2reg, adce, simplifycfg, instcombine.
    fn default() -> Self {
        Self::new([
            Pass::InstCombine,
            Pass::Reassociate,
            Pass::Gvn,
            Pass::SimplifyCfg,
            Pass::PromoteMemToReg,
            Pass::AggressiveDce,
            Pass::SimplifyCfg,
            Pass::InstCombine,
        ])
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passes.is_empty() {
            return f.write_str("none");
        }
        for (i, pass) in self.passes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(pass.name())?;
        }
        Ok(())
    }
}

impl FromStr for Pipeline {
    type Err = SessionError;

    /// Parse a comma-separated pass list. `none` or an empty string
    /// yields an empty pipeline.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::none());
        }
        s.split(',')
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}
