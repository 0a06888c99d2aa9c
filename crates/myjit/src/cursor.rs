//! Instruction insertion cursor.
//!
//! A cursor appends instructions at the end of one block. It mutably
//! borrows the session that produced it, so at most one cursor exists at a
//! time and the module cannot be compiled while a cursor is alive.

use std::collections::HashMap;

use cranelift_codegen::cursor::{Cursor, FuncCursor};
use cranelift_codegen::entity::PrimaryMap;
use cranelift_codegen::ir::{
    self, ExtFuncData, ExternalName, FuncRef, Inst, InsertBuilder, InstBuilder, StackSlot,
    StackSlotData, StackSlotKind, UserExternalName, Value,
};
use cranelift_module::FuncId;

use crate::error::SessionError;
use crate::module::{BlockRef, FunctionBody, FunctionDecl};

/// Appends instructions at the end of a block.
pub struct InsertCursor<'a> {
    block: BlockRef,
    pos: FuncCursor<'a>,
    imports: &'a mut HashMap<FuncId, FuncRef>,
    decls: &'a PrimaryMap<FuncId, FunctionDecl>,
}

impl<'a> InsertCursor<'a> {
    pub(crate) fn new(
        block: BlockRef,
        body: &'a mut FunctionBody,
        decls: &'a PrimaryMap<FuncId, FunctionDecl>,
    ) -> Self {
        let FunctionBody { func, imports, .. } = body;
        Self {
            block,
            pos: FuncCursor::new(func).at_bottom(block.block),
            imports,
            decls,
        }
    }

    /// The block instructions are appended to.
    pub fn block(&self) -> BlockRef {
        self.block
    }

    /// Parameters of the current block. For an entry block these are the
    /// function arguments.
    pub fn params(&self) -> &[Value] {
        self.pos.func.dfg.block_params(self.block.block)
    }

    /// Full Cranelift instruction builder appending at the cursor.
    pub fn ins(&mut self) -> InsertBuilder<'_, &mut FuncCursor<'a>> {
        self.pos.ins()
    }

    /// Results produced by `inst`.
    pub fn inst_results(&self, inst: Inst) -> &[Value] {
        self.pos.func.dfg.inst_results(inst)
    }

    pub fn iconst(&mut self, ty: ir::Type, imm: i64) -> Value {
        self.pos.ins().iconst(ty, imm)
    }

    /// Emit a direct call to `callee`, importing it into this function on
    /// first use.
    pub fn call(&mut self, callee: FuncId, args: &[Value]) -> Result<Inst, SessionError> {
        let func_ref = self.func_ref(callee)?;
        Ok(self.pos.ins().call(func_ref, args))
    }

    /// The function-local reference to `callee`.
    pub fn func_ref(&mut self, callee: FuncId) -> Result<FuncRef, SessionError> {
        if let Some(func_ref) = self.imports.get(&callee) {
            return Ok(*func_ref);
        }
        let decl = self
            .decls
            .get(callee)
            .ok_or(SessionError::UnknownFunction(callee))?;

        let func = &mut *self.pos.func;
        let signature = func.import_signature(decl.signature().clone());
        let name = func.declare_imported_user_function(UserExternalName::new(0, callee.as_u32()));
        let func_ref = func.import_function(ExtFuncData {
            name: ExternalName::user(name),
            signature,
            colocated: false,
        });
        self.imports.insert(callee, func_ref);
        Ok(func_ref)
    }

    /// Unconditional branch to `dest`.
    pub fn jump(&mut self, dest: BlockRef, args: &[Value]) -> Result<Inst, SessionError> {
        self.check_local(dest)?;
        Ok(self.pos.ins().jump(dest.block, args))
    }

    /// Two-way branch on a nonzero integer `cond`.
    pub fn brif(
        &mut self,
        cond: Value,
        then_block: BlockRef,
        then_args: &[Value],
        else_block: BlockRef,
        else_args: &[Value],
    ) -> Result<Inst, SessionError> {
        self.check_local(then_block)?;
        self.check_local(else_block)?;
        Ok(self
            .pos
            .ins()
            .brif(cond, then_block.block, then_args, else_block.block, else_args))
    }

    /// Allocate an explicit stack slot of `size` bytes aligned to
    /// `1 << align_shift` in the current function.
    pub fn create_stack_slot(&mut self, size: u32, align_shift: u8) -> StackSlot {
        self.pos
            .func
            .create_sized_stack_slot(StackSlotData::new(StackSlotKind::ExplicitSlot, size, align_shift))
    }

    pub fn return_(&mut self, values: &[Value]) -> Inst {
        self.pos.ins().return_(values)
    }

    fn check_local(&self, dest: BlockRef) -> Result<(), SessionError> {
        if dest.func == self.block.func && self.pos.func.layout.is_block_inserted(dest.block) {
            Ok(())
        } else {
            Err(SessionError::UnknownBlock(dest.to_string()))
        }
    }
}
