//! The intermediate module: function declarations and their bodies.

use std::collections::HashMap;
use std::fmt;

use cranelift_codegen::entity::{PrimaryMap, SecondaryMap};
use cranelift_codegen::ir::{self, Block, FuncRef, Function, Signature, UserFuncName, Value};
use cranelift_codegen::settings;
use cranelift_codegen::verifier::verify_function;
use cranelift_module::{FuncId, Linkage};

use crate::cursor::InsertCursor;
use crate::error::SessionError;

/// A declared function: name and signature.
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    name: String,
    signature: Signature,
}

impl FunctionDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

/// Handle to a basic block of a specific function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub(crate) func: FuncId,
    pub(crate) block: Block,
}

impl BlockRef {
    /// The function this block belongs to.
    pub fn function(&self) -> FuncId {
        self.func
    }

    /// The underlying Cranelift block.
    pub fn block(&self) -> Block {
        self.block
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.block, self.func)
    }
}

/// The IR of a defined function plus bookkeeping the session needs.
pub(crate) struct FunctionBody {
    pub(crate) func: Function,
    pub(crate) block_names: SecondaryMap<Block, String>,
    /// Callees already imported into `func`.
    pub(crate) imports: HashMap<FuncId, FuncRef>,
}

impl FunctionBody {
    fn new(id: FuncId, signature: Signature) -> Self {
        Self {
            func: Function::with_name_signature(UserFuncName::user(0, id.as_u32()), signature),
            block_names: SecondaryMap::new(),
            imports: HashMap::new(),
        }
    }

    fn contains(&self, block: Block) -> bool {
        self.func.layout.is_block_inserted(block)
    }
}

/// A named container of functions, exclusively owned by one session until
/// it is handed to the execution engine.
pub struct IrModule {
    name: String,
    pub(crate) decls: PrimaryMap<FuncId, FunctionDecl>,
    pub(crate) bodies: HashMap<FuncId, FunctionBody>,
}

impl IrModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decls: PrimaryMap::new(),
            bodies: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a function declaration. Names are not checked for uniqueness.
    pub fn declare_function(&mut self, name: impl Into<String>, signature: Signature) -> FuncId {
        let name = name.into();
        let id = self.decls.push(FunctionDecl { name, signature });
        tracing::debug!(module = %self.name, function = %self.decls[id].name, %id, "Declared function");
        id
    }

    pub fn function(&self, id: FuncId) -> Option<&FunctionDecl> {
        self.decls.get(id)
    }

    /// All declarations in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &FunctionDecl)> {
        self.decls.iter()
    }

    /// Whether `id` has at least one block.
    pub fn is_defined(&self, id: FuncId) -> bool {
        self.bodies.contains_key(&id)
    }

    /// Linkage the function gets in the execution engine.
    pub(crate) fn linkage(&self, id: FuncId) -> Linkage {
        if self.is_defined(id) {
            Linkage::Export
        } else {
            Linkage::Import
        }
    }

    /// Append a new empty block to `func`. The first block is the entry
    /// block and receives the function's parameters as block parameters.
    pub fn create_block(&mut self, name: impl Into<String>, func: FuncId) -> Result<BlockRef, SessionError> {
        let decl = self.decls.get(func).ok_or(SessionError::UnknownFunction(func))?;
        let body = self
            .bodies
            .entry(func)
            .or_insert_with(|| FunctionBody::new(func, decl.signature.clone()));

        let block = body.func.dfg.make_block();
        let is_entry = body.func.layout.entry_block().is_none();
        body.func.layout.append_block(block);
        if is_entry {
            let param_types: Vec<ir::Type> =
                body.func.signature.params.iter().map(|p| p.value_type).collect();
            for ty in param_types {
                body.func.dfg.append_block_param(block, ty);
            }
        }
        let name = name.into();
        tracing::debug!(function = %decl.name, %block, block_name = %name, is_entry, "Created block");
        body.block_names[block] = name;

        Ok(BlockRef { func, block })
    }

    /// Append a parameter of type `ty` to `block`.
    pub fn append_block_param(&mut self, block: BlockRef, ty: ir::Type) -> Result<Value, SessionError> {
        let body = self.body_mut(block)?;
        Ok(body.func.dfg.append_block_param(block.block, ty))
    }

    /// Parameters of `block`.
    pub fn block_params(&self, block: BlockRef) -> Result<&[Value], SessionError> {
        let body = self.body(block)?;
        Ok(body.func.dfg.block_params(block.block))
    }

    /// Name given to `block` at creation.
    pub fn block_name(&self, block: BlockRef) -> Result<&str, SessionError> {
        let body = self.body(block)?;
        Ok(&body.block_names[block.block])
    }

    /// Check that `block` exists in this module.
    pub fn check_block(&self, block: BlockRef) -> Result<(), SessionError> {
        self.body(block).map(|_| ())
    }

    /// Open an insertion cursor at the end of `block`.
    pub(crate) fn cursor(&mut self, block: BlockRef) -> Result<InsertCursor<'_>, SessionError> {
        let body = self
            .bodies
            .get_mut(&block.func)
            .filter(|body| body.contains(block.block))
            .ok_or_else(|| SessionError::UnknownBlock(block.to_string()))?;
        Ok(InsertCursor::new(block, body, &self.decls))
    }

    /// Run the structural verifier over `func`. Never mutates the function.
    pub fn verify(&self, func: FuncId, flags: &settings::Flags) -> Result<(), SessionError> {
        let decl = self.decls.get(func).ok_or(SessionError::UnknownFunction(func))?;
        let Some(body) = self.bodies.get(&func) else {
            // Declarations have nothing to check.
            return Ok(());
        };
        verify_function(&body.func, flags).map_err(|errors| SessionError::Verification {
            function: decl.name.clone(),
            message: errors.to_string(),
        })
    }

    /// Textual Cranelift IR of `func`.
    pub fn display(&self, func: FuncId) -> Result<String, SessionError> {
        let decl = self.decls.get(func).ok_or(SessionError::UnknownFunction(func))?;
        Ok(match self.bodies.get(&func) {
            Some(body) => body.func.display().to_string(),
            None => format!("; declaration {}{}\n", decl.name, decl.signature),
        })
    }

    fn body(&self, block: BlockRef) -> Result<&FunctionBody, SessionError> {
        self.bodies
            .get(&block.func)
            .filter(|body| body.contains(block.block))
            .ok_or_else(|| SessionError::UnknownBlock(block.to_string()))
    }

    fn body_mut(&mut self, block: BlockRef) -> Result<&mut FunctionBody, SessionError> {
        self.bodies
            .get_mut(&block.func)
            .filter(|body| body.contains(block.block))
            .ok_or_else(|| SessionError::UnknownBlock(block.to_string()))
    }
}

impl fmt::Debug for IrModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrModule")
            .field("name", &self.name)
            .field("functions", &self.decls.len())
            .field("defined", &self.bodies.len())
            .finish()
    }
}
