//! Thin wrapper around an LLVM basic block that tracks whether it has
//! already been terminated, grounded on
//! `examples/original_source/include/Block.hh` / `src/Block.cpp`.

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::values::BasicValueEnum;

use crate::diagnostics::{CraeftError, CraeftResult, SourcePos};

pub struct Block<'ctx> {
    pub llvm: BasicBlock<'ctx>,
    terminated: bool,
}

impl<'ctx> Block<'ctx> {
    pub fn new(llvm: BasicBlock<'ctx>) -> Self {
        Block {
            llvm,
            terminated: false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn point_builder(&self, builder: &Builder<'ctx>) {
        builder.position_at_end(self.llvm);
    }

    pub fn jump_to(&mut self, builder: &Builder<'ctx>, other: &Block<'ctx>) -> CraeftResult<()> {
        if self.terminated {
            return Err(CraeftError::internal(
                "cannot jump from an already-terminated block",
                SourcePos::synthetic(),
            ));
        }
        builder
            .build_unconditional_branch(other.llvm)
            .map_err(|e| CraeftError::internal(e.to_string(), SourcePos::synthetic()))?;
        self.terminated = true;
        Ok(())
    }

    pub fn cond_jump(
        &mut self,
        builder: &Builder<'ctx>,
        cond: inkwell::values::IntValue<'ctx>,
        then_b: &Block<'ctx>,
        else_b: &Block<'ctx>,
    ) -> CraeftResult<()> {
        if self.terminated {
            return Err(CraeftError::internal(
                "cannot branch from an already-terminated block",
                SourcePos::synthetic(),
            ));
        }
        builder
            .build_conditional_branch(cond, then_b.llvm, else_b.llvm)
            .map_err(|e| CraeftError::internal(e.to_string(), SourcePos::synthetic()))?;
        self.terminated = true;
        Ok(())
    }

    pub fn return_value(
        &mut self,
        builder: &Builder<'ctx>,
        val: BasicValueEnum<'ctx>,
    ) -> CraeftResult<()> {
        if self.terminated {
            return Ok(());
        }
        builder
            .build_return(Some(&val))
            .map_err(|e| CraeftError::internal(e.to_string(), SourcePos::synthetic()))?;
        self.terminated = true;
        Ok(())
    }

    pub fn return_void(&mut self, builder: &Builder<'ctx>) -> CraeftResult<()> {
        if self.terminated {
            return Ok(());
        }
        builder
            .build_return(None)
            .map_err(|e| CraeftError::internal(e.to_string(), SourcePos::synthetic()))?;
        self.terminated = true;
        Ok(())
    }
}
