//! The semantic translator: name resolution, type checking and LLVM IR
//! emission in one pass over the AST, plus the template specialization
//! worklist.
//!
//! Grounded throughout on
//! `examples/original_source/src/TranslatorImpl.cpp` (cast dispatch,
//! operator codegen, if/then/else block sequencing) and
//! `src/ModuleCodegenImpl.cpp` (the fixed-point specialization worklist
//! drain). The scope-stack plumbing generalizes the teacher's
//! `crates/why_lib/src/codegen/context.rs` `CodegenContext` (two maps:
//! variables, functions) to the four namespaces `Environment` exposes.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FloatType, IntType};
use inkwell::values::{BasicValue, BasicValueEnum, FunctionValue, PointerValue};
use inkwell::{AddressSpace, OptimizationLevel};
use log::debug;

use crate::ast::{self, BinOp, TypeExpr};
use crate::block::Block;
use crate::diagnostics::{CraeftError, CraeftResult, SourcePos};
use crate::environment::{Environment, TemplateStruct, TemplateValue, Variable};
use crate::types::{mangle_name, FloatPrecision, TemplateType, Type};

/// What an environment-bound identifier actually holds at the LLVM level:
/// a pointer to storage for ordinary variables, or the function value
/// itself for functions (mirrors the original `Variable::get_type`
/// special-casing `Function<>`).
#[derive(Clone, Copy)]
pub enum Handle<'ctx> {
    Pointer(PointerValue<'ctx>),
    Function(FunctionValue<'ctx>),
}

/// A fully-typed, ready-to-use LLVM value (never a bare pointer to
/// storage -- those only live in `Handle::Pointer` until loaded).
#[derive(Clone)]
pub struct Value<'ctx> {
    pub ty: Type,
    pub llvm: BasicValueEnum<'ctx>,
}

pub struct Translator<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    env: Environment<Handle<'ctx>>,
    type_cache: HashMap<Type, BasicTypeEnum<'ctx>>,
    struct_order: HashMap<String, Vec<(String, Type)>>,
    /// Registered but not-yet-specialized function templates, plus the
    /// specializations discovered while codegenning the current function
    /// and still awaiting a body.
    worklist: Vec<(String, Vec<Type>, TemplateValue)>,
    target_machine: Option<TargetMachine>,
}

impl<'ctx> Translator<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> CraeftResult<Self> {
        let module = context.create_module(module_name);
        let builder = context.create_builder();

        Target::initialize_all(&InitializationConfig::default());
        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple)
            .map_err(|e| CraeftError::internal(e.to_string(), SourcePos::synthetic()))?;
        let target_machine = target.create_target_machine(
            &triple,
            "generic",
            "",
            OptimizationLevel::None,
            RelocMode::Default,
            CodeModel::Default,
        );
        if let Some(tm) = &target_machine {
            module.set_triple(&triple);
            module.set_data_layout(&tm.get_target_data().get_data_layout());
        }

        Ok(Translator {
            context,
            module,
            builder,
            env: Environment::new(),
            type_cache: HashMap::new(),
            struct_order: HashMap::new(),
            worklist: Vec::new(),
            target_machine,
        })
    }

    pub fn module(&self) -> &Module<'ctx> {
        &self.module
    }

    // ----- type lowering -----------------------------------------------------

    pub fn resolve_type_expr(&self, ty: &TypeExpr, pos: &SourcePos) -> CraeftResult<Type> {
        match ty {
            TypeExpr::Void => Ok(Type::Void),
            TypeExpr::Named(name) => self.env.lookup_type(name, pos).cloned(),
            TypeExpr::Pointer(inner) => {
                Ok(Type::Pointer(Box::new(self.resolve_type_expr(inner, pos)?)))
            }
            TypeExpr::Templated(name, args) => {
                let ts = self.env.lookup_template_struct(name, pos)?.clone();
                let resolved_args = args
                    .iter()
                    .map(|a| self.resolve_type_expr(a, pos))
                    .collect::<CraeftResult<Vec<_>>>()?;
                specialize_struct(&ts, &resolved_args, pos)
            }
        }
    }

    fn llvm_type(&mut self, ty: &Type) -> CraeftResult<BasicTypeEnum<'ctx>> {
        if let Some(cached) = self.type_cache.get(ty) {
            return Ok(*cached);
        }
        let llvm_ty: BasicTypeEnum<'ctx> = match ty {
            Type::SignedInt(n) | Type::UnsignedInt(n) => {
                self.context.custom_width_int_type(*n).into()
            }
            Type::Float(FloatPrecision::Single) => self.context.f32_type().into(),
            Type::Float(FloatPrecision::Double) => self.context.f64_type().into(),
            Type::Void => {
                return Err(CraeftError::internal(
                    "void has no LLVM value representation",
                    SourcePos::synthetic(),
                ))
            }
            Type::Pointer(_) => self.context.ptr_type(AddressSpace::default()).into(),
            Type::Function { .. } => self.context.ptr_type(AddressSpace::default()).into(),
            Type::Struct { name, fields } => {
                if let Some(existing) = self.module.get_struct_type(name) {
                    existing.into()
                } else {
                    let st = self.context.opaque_struct_type(name);
                    let field_tys = fields
                        .iter()
                        .map(|(_, t)| self.llvm_type(t))
                        .collect::<CraeftResult<Vec<_>>>()?;
                    st.set_body(&field_tys, false);
                    self.struct_order
                        .insert(name.clone(), fields.clone());
                    st.into()
                }
            }
        };
        self.type_cache.insert(ty.clone(), llvm_ty);
        Ok(llvm_ty)
    }

    fn metadata_type(&mut self, ty: &Type) -> CraeftResult<BasicMetadataTypeEnum<'ctx>> {
        Ok(self.llvm_type(ty)?.into())
    }

    // ----- casts -----------------------------------------------------

    /// Mirrors `CastVisitor`: destination signedness picks sign- vs.
    /// zero-extend for integer<->integer casts and for float<->int casts;
    /// identical source/dest types short-circuit to a no-op.
    pub fn cast(&mut self, value: Value<'ctx>, dest: &Type, pos: &SourcePos) -> CraeftResult<Value<'ctx>> {
        if &value.ty == dest {
            return Ok(value);
        }
        let dest_llvm = self.llvm_type(dest)?;
        let llvm = match (&value.ty, dest) {
            (Type::SignedInt(_) | Type::UnsignedInt(_), Type::SignedInt(_)) => self
                .builder
                .build_int_s_extend_or_bit_cast(
                    value.llvm.into_int_value(),
                    dest_llvm.into_int_type(),
                    "sext",
                )
                .map_err(cast_err(pos))?
                .into(),
            (Type::SignedInt(_) | Type::UnsignedInt(_), Type::UnsignedInt(_)) => self
                .builder
                .build_int_z_extend_or_bit_cast(
                    value.llvm.into_int_value(),
                    dest_llvm.into_int_type(),
                    "zext",
                )
                .map_err(cast_err(pos))?
                .into(),
            (Type::Float(_), Type::SignedInt(_)) => self
                .builder
                .build_float_to_signed_int(value.llvm.into_float_value(), dest_llvm.into_int_type(), "fptosi")
                .map_err(cast_err(pos))?
                .into(),
            (Type::Float(_), Type::UnsignedInt(_)) => self
                .builder
                .build_float_to_unsigned_int(value.llvm.into_float_value(), dest_llvm.into_int_type(), "fptoui")
                .map_err(cast_err(pos))?
                .into(),
            (Type::SignedInt(_), Type::Float(_)) => self
                .builder
                .build_signed_int_to_float(value.llvm.into_int_value(), dest_llvm.into_float_type(), "sitofp")
                .map_err(cast_err(pos))?
                .into(),
            (Type::UnsignedInt(_), Type::Float(_)) => self
                .builder
                .build_unsigned_int_to_float(value.llvm.into_int_value(), dest_llvm.into_float_type(), "uitofp")
                .map_err(cast_err(pos))?
                .into(),
            (Type::Float(a), Type::Float(b)) => {
                if (*a as u8) < (*b as u8) {
                    self.builder
                        .build_float_ext(value.llvm.into_float_value(), dest_llvm.into_float_type(), "fpext")
                        .map_err(cast_err(pos))?
                        .into()
                } else {
                    self.builder
                        .build_float_trunc(value.llvm.into_float_value(), dest_llvm.into_float_type(), "fptrunc")
                        .map_err(cast_err(pos))?
                        .into()
                }
            }
            (Type::Pointer(_), Type::SignedInt(_) | Type::UnsignedInt(_)) => self
                .builder
                .build_ptr_to_int(value.llvm.into_pointer_value(), dest_llvm.into_int_type(), "ptrtoint")
                .map_err(cast_err(pos))?
                .into(),
            (Type::SignedInt(_) | Type::UnsignedInt(_), Type::Pointer(_)) => self
                .builder
                .build_int_to_ptr(value.llvm.into_int_value(), dest_llvm.into_pointer_type(), "inttoptr")
                .map_err(cast_err(pos))?
                .into(),
            (Type::Pointer(_), Type::Pointer(_)) => value.llvm,
            _ => return Err(CraeftError::ty("cannot cast types", pos.clone())),
        };
        Ok(Value {
            ty: dest.clone(),
            llvm,
        })
    }

    // ----- load/store -----------------------------------------------------

    pub fn add_load(&mut self, ptr: Value<'ctx>, pos: &SourcePos) -> CraeftResult<Value<'ctx>> {
        let pointee = match &ptr.ty {
            Type::Pointer(inner) => (**inner).clone(),
            _ => {
                return Err(CraeftError::ty(
                    "cannot dereference non-pointer value",
                    pos.clone(),
                ))
            }
        };
        let llvm_ty = self.llvm_type(&pointee)?;
        let loaded = self
            .builder
            .build_load(llvm_ty, ptr.llvm.into_pointer_value(), "load")
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(Value {
            ty: pointee,
            llvm: loaded,
        })
    }

    pub fn add_store(
        &mut self,
        ptr: Value<'ctx>,
        val: Value<'ctx>,
        pos: &SourcePos,
    ) -> CraeftResult<()> {
        let pointee = match &ptr.ty {
            Type::Pointer(inner) => (**inner).clone(),
            _ => {
                return Err(CraeftError::ty(
                    "cannot dereference non-pointer value",
                    pos.clone(),
                ))
            }
        };
        if pointee != val.ty {
            return Err(CraeftError::ty(
                format!(
                    "cannot store a value of type \"{}\" into a location of type \"{}\"",
                    val.ty, pointee
                ),
                pos.clone(),
            ));
        }
        self.builder
            .build_store(ptr.llvm.into_pointer_value(), val.llvm)
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(())
    }

    // ----- binary/unary operators -----------------------------------------------------

    pub fn binop(
        &mut self,
        op: &BinOp,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        use BinOp::*;
        match op {
            Add | Sub | Mul | Div | Mod => self.arith(op, lhs, rhs, pos),
            BitAnd | BitOr | BitXor => self.bitwise(op, lhs, rhs, pos),
            Shl | Shr => self.shift(op, lhs, rhs, pos),
            Eq | Neq | Lt | Le | Gt | Ge => self.compare(op, lhs, rhs, pos),
            And | Or => self.logical(op, lhs, rhs, pos),
            Assign => Err(CraeftError::internal(
                "assignment must be handled by the statement codegen, not binop",
                pos.clone(),
            )),
        }
    }

    /// Widens a pair of numeric operands to a common type, mirroring
    /// `get_wider`/`Operator::extend_and_perform` in the original compiler:
    /// the operand with the narrower width is extended up to the wider
    /// operand's type (ties keep `lhs`'s type), and the op is performed at
    /// that width. Integer pairs sign-extend when both operands are signed
    /// and zero-extend otherwise; float pairs extend to the wider precision.
    /// Rejects anything that isn't a matching-kind numeric pair (integral
    /// with integral, float with float).
    fn widen_numeric(
        &mut self,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        pos: &SourcePos,
    ) -> CraeftResult<(Value<'ctx>, Value<'ctx>)> {
        if lhs.ty.is_integral() && rhs.ty.is_integral() {
            let lhs_width = int_width(&lhs.ty);
            let rhs_width = int_width(&rhs.ty);
            let wider_ty = if lhs_width >= rhs_width {
                lhs.ty.clone()
            } else {
                rhs.ty.clone()
            };
            let sign_extend = lhs.ty.is_signed() && rhs.ty.is_signed();
            let wider = self.llvm_type(&wider_ty)?.into_int_type();
            let lhs = self.extend_int(lhs, &wider_ty, wider, sign_extend, pos)?;
            let rhs = self.extend_int(rhs, &wider_ty, wider, sign_extend, pos)?;
            Ok((lhs, rhs))
        } else if lhs.ty.is_float() && rhs.ty.is_float() {
            let wider_ty = if float_rank(&lhs.ty) >= float_rank(&rhs.ty) {
                lhs.ty.clone()
            } else {
                rhs.ty.clone()
            };
            let wider = self.llvm_type(&wider_ty)?.into_float_type();
            let lhs = self.extend_float(lhs, &wider_ty, wider, pos)?;
            let rhs = self.extend_float(rhs, &wider_ty, wider, pos)?;
            Ok((lhs, rhs))
        } else {
            Err(CraeftError::ty(
                format!(
                    "mismatched operand types \"{}\" and \"{}\"",
                    lhs.ty, rhs.ty
                ),
                pos.clone(),
            ))
        }
    }

    fn extend_int(
        &mut self,
        v: Value<'ctx>,
        wider_ty: &Type,
        wider: IntType<'ctx>,
        sign_extend: bool,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        if &v.ty == wider_ty {
            return Ok(v);
        }
        let llvm = if sign_extend {
            self.builder
                .build_int_s_extend_or_bit_cast(v.llvm.into_int_value(), wider, "widens")
        } else {
            self.builder
                .build_int_z_extend_or_bit_cast(v.llvm.into_int_value(), wider, "widenu")
        }
        .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(Value {
            ty: wider_ty.clone(),
            llvm: llvm.into(),
        })
    }

    fn extend_float(
        &mut self,
        v: Value<'ctx>,
        wider_ty: &Type,
        wider: FloatType<'ctx>,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        if &v.ty == wider_ty {
            return Ok(v);
        }
        let llvm = self
            .builder
            .build_float_ext(v.llvm.into_float_value(), wider, "fpwiden")
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(Value {
            ty: wider_ty.clone(),
            llvm: llvm.into(),
        })
    }

    fn arith(
        &mut self,
        op: &BinOp,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        use BinOp::*;
        match (&lhs.ty, &rhs.ty) {
            (Type::Pointer(elem), other) if other.is_integral() && matches!(op, Add | Sub) => {
                let elem_ty = (**elem).clone();
                return self.ptr_int_arith(*op == Sub, lhs, rhs, elem_ty, pos);
            }
            (other, Type::Pointer(elem)) if other.is_integral() && matches!(op, Add) => {
                let elem_ty = (**elem).clone();
                return self.ptr_int_arith(false, rhs, lhs, elem_ty, pos);
            }
            (Type::Pointer(lelem), Type::Pointer(relem)) if matches!(op, Sub) => {
                if lelem != relem {
                    return Err(CraeftError::ty(
                        "cannot subtract pointers of different pointee types",
                        pos.clone(),
                    ));
                }
                return self.ptr_ptr_diff(lhs, rhs, (**lelem).clone(), pos);
            }
            (Type::Pointer(_), _) | (_, Type::Pointer(_)) => {
                return Err(CraeftError::ty(
                    format!(
                        "cannot perform \"{op:?}\" between \"{}\" and \"{}\"",
                        lhs.ty, rhs.ty
                    ),
                    pos.clone(),
                ))
            }
            _ => {}
        }
        if !lhs.ty.is_integral() && !lhs.ty.is_float() {
            return Err(CraeftError::ty(
                format!("\"{}\" does not support arithmetic", lhs.ty),
                pos.clone(),
            ));
        }
        if !rhs.ty.is_integral() && !rhs.ty.is_float() {
            return Err(CraeftError::ty(
                format!("\"{}\" does not support arithmetic", rhs.ty),
                pos.clone(),
            ));
        }
        let (lhs, rhs) = self.widen_numeric(lhs, rhs, pos)?;
        let ty = lhs.ty.clone();
        let b = &self.builder;
        let llvm = if lhs.ty.is_float() {
            let (l, r) = (lhs.llvm.into_float_value(), rhs.llvm.into_float_value());
            match op {
                BinOp::Add => b.build_float_add(l, r, "fadd"),
                BinOp::Sub => b.build_float_sub(l, r, "fsub"),
                BinOp::Mul => b.build_float_mul(l, r, "fmul"),
                BinOp::Div => b.build_float_div(l, r, "fdiv"),
                BinOp::Mod => b.build_float_rem(l, r, "frem"),
                _ => unreachable!(),
            }
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?
            .into()
        } else {
            let (l, r) = (lhs.llvm.into_int_value(), rhs.llvm.into_int_value());
            let signed = lhs.ty.is_signed();
            match op {
                BinOp::Add => b.build_int_add(l, r, "add").map(BasicValueEnum::from),
                BinOp::Sub => b.build_int_sub(l, r, "sub").map(BasicValueEnum::from),
                BinOp::Mul => b.build_int_mul(l, r, "mul").map(BasicValueEnum::from),
                BinOp::Div if signed => {
                    b.build_int_signed_div(l, r, "sdiv").map(BasicValueEnum::from)
                }
                BinOp::Div => b
                    .build_int_unsigned_div(l, r, "udiv")
                    .map(BasicValueEnum::from),
                BinOp::Mod if signed => {
                    b.build_int_signed_rem(l, r, "srem").map(BasicValueEnum::from)
                }
                BinOp::Mod => b
                    .build_int_unsigned_rem(l, r, "urem")
                    .map(BasicValueEnum::from),
                _ => unreachable!(),
            }
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?
        };
        Ok(Value { ty, llvm })
    }

    /// `pointer +/- int`, grounded in `AddOperator::ptr_int_op`/`int_ptr_op`
    /// and `SubOperator::ptr_int_op`: a single GEP with the (possibly
    /// negated) integer as index, result stays the same pointer type.
    fn ptr_int_arith(
        &mut self,
        negate: bool,
        ptr: Value<'ctx>,
        idx: Value<'ctx>,
        elem_ty: Type,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        let elem_llvm = self.llvm_type(&elem_ty)?;
        let mut idx_val = idx.llvm.into_int_value();
        if negate {
            idx_val = self
                .builder
                .build_int_neg(idx_val, "negidx")
                .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        }
        let gep = unsafe {
            self.builder
                .build_gep(elem_llvm, ptr.llvm.into_pointer_value(), &[idx_val], "ptroffset")
        }
        .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(Value {
            ty: Type::Pointer(Box::new(elem_ty)),
            llvm: gep.as_basic_value_enum(),
        })
    }

    /// `pointer - pointer` (identical pointees): element-count difference,
    /// grounded in `SubOperator::ptr_ptr_op` (`CreatePtrDiff`) but, unlike
    /// the original, tagged with an actual integer result type rather than
    /// the pointer's own type -- see `DESIGN.md`.
    fn ptr_ptr_diff(
        &mut self,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        elem_ty: Type,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        let word = self.context.i64_type();
        let l = self
            .builder
            .build_ptr_to_int(lhs.llvm.into_pointer_value(), word, "ptrtoint")
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        let r = self
            .builder
            .build_ptr_to_int(rhs.llvm.into_pointer_value(), word, "ptrtoint")
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        let byte_diff = self
            .builder
            .build_int_sub(l, r, "ptrdiff")
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        let elem_llvm_ty = self.llvm_type(&elem_ty)?;
        let elem_size = self
            .target_machine
            .as_ref()
            .map(|tm| tm.get_target_data().get_store_size(&elem_llvm_ty))
            .unwrap_or(1)
            .max(1);
        let elem_size_val = word.const_int(elem_size, false);
        let count = self
            .builder
            .build_int_signed_div(byte_diff, elem_size_val, "ptrcount")
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(Value {
            ty: Type::SignedInt(64),
            llvm: count.into(),
        })
    }

    fn bitwise(
        &mut self,
        op: &BinOp,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        if !lhs.ty.is_integral() || !rhs.ty.is_integral() {
            return Err(CraeftError::ty(
                "bitwise operators require integer operands",
                pos.clone(),
            ));
        }
        let (lhs, rhs) = self.widen_numeric(lhs, rhs, pos)?;
        let (l, r) = (lhs.llvm.into_int_value(), rhs.llvm.into_int_value());
        let llvm = match op {
            BinOp::BitAnd => self.builder.build_and(l, r, "and"),
            BinOp::BitOr => self.builder.build_or(l, r, "or"),
            BinOp::BitXor => self.builder.build_xor(l, r, "xor"),
            _ => unreachable!(),
        }
        .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(Value {
            ty: lhs.ty,
            llvm: llvm.into(),
        })
    }

    /// Right-shift is arithmetic for signed operands and logical for
    /// unsigned, per the resolved open question (`SPEC_FULL.md` §9).
    fn shift(
        &mut self,
        op: &BinOp,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        if !lhs.ty.is_integral() || !rhs.ty.is_integral() {
            return Err(CraeftError::ty(
                "shift operators require integer operands",
                pos.clone(),
            ));
        }
        let (l, r) = (lhs.llvm.into_int_value(), rhs.llvm.into_int_value());
        let llvm = match op {
            BinOp::Shl => self.builder.build_left_shift(l, r, "shl"),
            BinOp::Shr => {
                self.builder
                    .build_right_shift(l, r, lhs.ty.is_signed(), "shr")
            }
            _ => unreachable!(),
        }
        .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(Value {
            ty: lhs.ty,
            llvm: llvm.into(),
        })
    }

    fn compare(
        &mut self,
        op: &BinOp,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        use inkwell::FloatPredicate as FP;
        use inkwell::IntPredicate as IP;
        let result_ty = Type::UnsignedInt(1);

        // Pointer equality/ordering: identical pointees, compared as
        // unsigned integers via ptrtoint, mirroring `ComparisonOperator::
        // ptr_ptr_op` (always `unsigned_int_predicate()` regardless of which
        // comparison it is).
        if lhs.ty.is_pointer() || rhs.ty.is_pointer() {
            let (Type::Pointer(lelem), Type::Pointer(relem)) = (&lhs.ty, &rhs.ty) else {
                return Err(CraeftError::ty(
                    format!("cannot compare \"{}\" and \"{}\"", lhs.ty, rhs.ty),
                    pos.clone(),
                ));
            };
            if lelem != relem {
                return Err(CraeftError::ty(
                    "cannot compare pointers of different pointee types",
                    pos.clone(),
                ));
            }
            let word = self.context.i64_type();
            let l = self
                .builder
                .build_ptr_to_int(lhs.llvm.into_pointer_value(), word, "ptrtoint")
                .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
            let r = self
                .builder
                .build_ptr_to_int(rhs.llvm.into_pointer_value(), word, "ptrtoint")
                .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
            let pred = match op {
                BinOp::Eq => IP::EQ,
                BinOp::Neq => IP::NE,
                BinOp::Lt => IP::ULT,
                BinOp::Le => IP::ULE,
                BinOp::Gt => IP::UGT,
                BinOp::Ge => IP::UGE,
                _ => unreachable!(),
            };
            let llvm = self
                .builder
                .build_int_compare(pred, l, r, "ptrcmp")
                .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
            return Ok(Value {
                ty: result_ty,
                llvm: llvm.into(),
            });
        }

        if !(lhs.ty.is_integral() || lhs.ty.is_float()) || !(rhs.ty.is_integral() || rhs.ty.is_float())
        {
            return Err(CraeftError::ty(
                format!("\"{}\" does not support comparison", lhs.ty),
                pos.clone(),
            ));
        }
        let (lhs, rhs) = self.widen_numeric(lhs, rhs, pos)?;
        let llvm: BasicValueEnum<'ctx> = if lhs.ty.is_float() {
            let (l, r) = (lhs.llvm.into_float_value(), rhs.llvm.into_float_value());
            let pred = match op {
                BinOp::Eq => FP::OEQ,
                BinOp::Neq => FP::ONE,
                BinOp::Lt => FP::OLT,
                BinOp::Le => FP::OLE,
                BinOp::Gt => FP::OGT,
                BinOp::Ge => FP::OGE,
                _ => unreachable!(),
            };
            self.builder
                .build_float_compare(pred, l, r, "fcmp")
                .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?
                .into()
        } else {
            let (l, r) = (lhs.llvm.into_int_value(), rhs.llvm.into_int_value());
            let signed = lhs.ty.is_signed();
            let pred = match op {
                BinOp::Eq => IP::EQ,
                BinOp::Neq => IP::NE,
                BinOp::Lt if signed => IP::SLT,
                BinOp::Lt => IP::ULT,
                BinOp::Le if signed => IP::SLE,
                BinOp::Le => IP::ULE,
                BinOp::Gt if signed => IP::SGT,
                BinOp::Gt => IP::UGT,
                BinOp::Ge if signed => IP::SGE,
                BinOp::Ge => IP::UGE,
                _ => unreachable!(),
            };
            self.builder
                .build_int_compare(pred, l, r, "icmp")
                .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?
                .into()
        };
        Ok(Value {
            ty: result_ty,
            llvm,
        })
    }

    fn logical(
        &mut self,
        op: &BinOp,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        if lhs.ty != Type::UnsignedInt(1) || rhs.ty != Type::UnsignedInt(1) {
            return Err(CraeftError::ty(
                "logical operators require U1 (boolean) operands",
                pos.clone(),
            ));
        }
        let (l, r) = (lhs.llvm.into_int_value(), rhs.llvm.into_int_value());
        let llvm = match op {
            BinOp::And => self.builder.build_and(l, r, "booland"),
            BinOp::Or => self.builder.build_or(l, r, "boolor"),
            _ => unreachable!(),
        }
        .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(Value {
            ty: Type::UnsignedInt(1),
            llvm: llvm.into(),
        })
    }

    // ----- struct field access -----------------------------------------------------

    /// Computes the address of `base.field`; `base` must be a pointer to a
    /// struct.
    pub fn field_address(
        &mut self,
        base: Value<'ctx>,
        field: &str,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        let struct_ty = match &base.ty {
            Type::Pointer(inner) => (**inner).clone(),
            other => {
                return Err(CraeftError::ty(
                    format!("cannot access field of non-pointer value of type \"{other}\""),
                    pos.clone(),
                ))
            }
        };
        let (index, field_ty) = struct_ty.field(field).map(|(i, t)| (i, t.clone())).ok_or_else(|| {
            CraeftError::ty(format!("no field \"{field}\" on \"{struct_ty}\""), pos.clone())
        })?;
        let llvm_struct_ty = self.llvm_type(&struct_ty)?.into_struct_type();
        let ptr = self
            .builder
            .build_struct_gep(
                llvm_struct_ty,
                base.llvm.into_pointer_value(),
                index as u32,
                "field_addr",
            )
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        Ok(Value {
            ty: Type::Pointer(Box::new(field_ty)),
            llvm: ptr.as_basic_value_enum(),
        })
    }

    pub fn field_access(
        &mut self,
        base: Value<'ctx>,
        field: &str,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        let addr = self.field_address(base, field, pos)?;
        self.add_load(addr, pos)
    }

    // ----- environment passthrough -----------------------------------------------------

    pub fn env(&self) -> &Environment<Handle<'ctx>> {
        &self.env
    }

    pub fn push_scope(&mut self) {
        self.env.push();
    }

    pub fn pop_scope(&mut self, pos: &SourcePos) -> CraeftResult<()> {
        self.env.pop().map_err(|_| {
            CraeftError::internal("scope stack underflow", pos.clone())
        })
    }

    pub fn declare_local(
        &mut self,
        name: &str,
        ty: Type,
        pos: &SourcePos,
    ) -> CraeftResult<Value<'ctx>> {
        let llvm_ty = self.llvm_type(&ty)?;
        let alloca = self
            .builder
            .build_alloca(llvm_ty, name)
            .map_err(|e| CraeftError::internal(e.to_string(), pos.clone()))?;
        self.env.add_identifier(
            name,
            Variable {
                handle: Handle::Pointer(alloca),
                ty: ty.clone(),
            },
        );
        Ok(Value {
            ty: Type::Pointer(Box::new(ty)),
            llvm: alloca.as_basic_value_enum(),
        })
    }

    pub fn get_identifier_addr(&self, name: &str, pos: &SourcePos) -> CraeftResult<Value<'ctx>> {
        let var = self.env.lookup_identifier(name, pos)?;
        match var.handle {
            Handle::Pointer(p) => Ok(Value {
                ty: Type::Pointer(Box::new(var.ty.clone())),
                llvm: p.as_basic_value_enum(),
            }),
            Handle::Function(_) => Err(CraeftError::ty(
                format!("cannot take the address of function \"{name}\""),
                pos.clone(),
            )),
        }
    }

    pub fn get_identifier_value(&mut self, name: &str, pos: &SourcePos) -> CraeftResult<Value<'ctx>> {
        let var = self.env.lookup_identifier(name, pos)?.clone();
        match var.handle {
            Handle::Function(f) => Ok(Value {
                ty: var.ty,
                llvm: f.as_global_value().as_pointer_value().as_basic_value_enum(),
            }),
            Handle::Pointer(_) => {
                let addr = self.get_identifier_addr(name, pos)?;
                self.add_load(addr, pos)
            }
        }
    }

    pub fn lookup_type(&self, name: &str, pos: &SourcePos) -> CraeftResult<Type> {
        self.env.lookup_type(name, pos).cloned()
    }

    pub fn add_type(&mut self, name: &str, ty: Type) {
        self.env.add_type(name, ty);
    }

    pub fn add_template_struct(&mut self, name: &str, ts: TemplateStruct) {
        self.env.add_template_struct(name, ts);
    }

    pub fn add_template_function(&mut self, name: &str, tv: TemplateValue) {
        self.env.add_template_function(name, tv);
    }

    // ----- functions -----------------------------------------------------

    pub fn declare_function(
        &mut self,
        name: &str,
        ret: Type,
        args: &[(String, Type)],
        _pos: &SourcePos,
    ) -> CraeftResult<FunctionValue<'ctx>> {
        if let Some(existing) = self.module.get_function(name) {
            return Ok(existing);
        }
        let arg_tys = args
            .iter()
            .map(|(_, t)| self.metadata_type(t))
            .collect::<CraeftResult<Vec<_>>>()?;
        let fn_ty = if ret == Type::Void {
            self.context.void_type().fn_type(&arg_tys, false)
        } else {
            self.llvm_type(&ret)?.fn_type(&arg_tys, false)
        };
        let f = self.module.add_function(name, fn_ty, None);
        let fn_type = Type::Function {
            ret: Box::new(ret),
            args: args.iter().map(|(_, t)| t.clone()).collect(),
        };
        self.env.add_identifier(
            name,
            Variable {
                handle: Handle::Function(f),
                ty: fn_type,
            },
        );
        Ok(f)
    }

    /// Creates a new basic block inside the function currently being
    /// codegen'd, not yet pointed at by the builder.
    pub fn append_block(&self, f: FunctionValue<'ctx>, name: &str) -> Block<'ctx> {
        Block::new(self.context.append_basic_block(f, name))
    }

    pub fn point_at(&self, block: &Block<'ctx>) {
        block.point_builder(&self.builder);
    }

    pub fn current_function(&self) -> CraeftResult<FunctionValue<'ctx>> {
        self.builder
            .get_insert_block()
            .and_then(|b| b.get_parent())
            .ok_or_else(|| {
                CraeftError::internal("no function currently being built", SourcePos::synthetic())
            })
    }

    pub fn builder(&self) -> &Builder<'ctx> {
        &self.builder
    }

    pub fn append_worklist(&mut self, name: String, args: Vec<Type>, tv: TemplateValue) {
        self.worklist.push((name, args, tv));
    }

    /// Drains the specialization worklist to a fixed point: `codegen_fn` is
    /// called for every pending `(mangled name, args, template)` entry, and
    /// may itself push new entries onto the worklist (e.g. a template
    /// calling another template), which are then drained too. Mirrors
    /// `ModuleCodegenImpl::operator()(FunctionDefinition&)`'s index-based
    /// iteration over a vector that grows during the loop.
    pub fn drain_worklist(
        &mut self,
        mut codegen_fn: impl FnMut(&mut Self, &str, &[Type], &TemplateValue) -> CraeftResult<()>,
    ) -> CraeftResult<()> {
        let mut i = 0;
        while i < self.worklist.len() {
            let (name, args, tv) = self.worklist[i].clone();
            codegen_fn(self, &name, &args, &tv)?;
            i += 1;
        }
        self.worklist.clear();
        Ok(())
    }

    // ----- struct declarations -----------------------------------------------------

    pub fn declare_struct(
        &mut self,
        name: &str,
        fields: Vec<(String, Type)>,
        _pos: &SourcePos,
    ) -> CraeftResult<()> {
        let ty = Type::Struct {
            name: name.to_string(),
            fields,
        };
        self.llvm_type(&ty)?;
        self.env.add_type(name, ty);
        Ok(())
    }

    // ----- emission -----------------------------------------------------

    pub fn validate(&self) -> CraeftResult<()> {
        self.module
            .verify()
            .map_err(|e| CraeftError::internal(e.to_string(), SourcePos::synthetic()))
    }

    pub fn optimize(&self, level: u32) -> CraeftResult<()> {
        let passes = match level {
            0 => "default<O0>",
            1 => "default<O1>",
            2 => "default<O2>",
            _ => "default<O3>",
        };
        if let Some(tm) = &self.target_machine {
            self.module
                .run_passes(passes, tm, inkwell::passes::PassBuilderOptions::create())
                .map_err(|e| CraeftError::internal(e.to_string(), SourcePos::synthetic()))?;
        }
        Ok(())
    }

    pub fn emit_ir(&self, path: &std::path::Path) -> CraeftResult<()> {
        self.module
            .print_to_file(path)
            .map_err(|e| CraeftError::internal(e.to_string(), SourcePos::synthetic()))
    }

    pub fn emit_asm(&self, path: &std::path::Path) -> CraeftResult<()> {
        self.emit_via_target_machine(path, FileType::Assembly)
    }

    pub fn emit_obj(&self, path: &std::path::Path) -> CraeftResult<()> {
        self.emit_via_target_machine(path, FileType::Object)
    }

    fn emit_via_target_machine(&self, path: &std::path::Path, ft: FileType) -> CraeftResult<()> {
        let tm = self.target_machine.as_ref().ok_or_else(|| {
            CraeftError::internal("no target machine available", SourcePos::synthetic())
        })?;
        tm.write_to_file(&self.module, ft, path)
            .map_err(|e| CraeftError::internal(e.to_string(), SourcePos::synthetic()))
    }
}

fn cast_err(pos: &SourcePos) -> impl Fn(inkwell::builder::BuilderError) -> CraeftError + '_ {
    move |e| CraeftError::internal(e.to_string(), pos.clone())
}

/// Bit width of an integral `Type`; mirrors `get_width` in the original
/// compiler (there derived from the LLVM type, here read directly off the
/// `Type` since `SignedInt`/`UnsignedInt` already carry their width).
fn int_width(ty: &Type) -> u32 {
    match ty {
        Type::SignedInt(n) | Type::UnsignedInt(n) => *n,
        _ => unreachable!("int_width called on a non-integral type"),
    }
}

/// Ordering used to pick the wider of two float precisions.
fn float_rank(ty: &Type) -> u8 {
    match ty {
        Type::Float(FloatPrecision::Single) => 0,
        Type::Float(FloatPrecision::Double) => 1,
        _ => unreachable!("float_rank called on a non-float type"),
    }
}

fn specialize_struct(
    ts: &TemplateStruct,
    args: &[Type],
    pos: &SourcePos,
) -> CraeftResult<Type> {
    let fields = ts
        .fields
        .iter()
        .map(|(n, t)| Ok((n.clone(), t.specialize(args).ok_or_else(|| {
            CraeftError::generic("wrong number of template arguments", pos.clone())
        })?)))
        .collect::<CraeftResult<Vec<_>>>()?;
    Ok(Type::Struct {
        name: mangle_name(&ts.name, args),
        fields,
    })
}

/// Builds the template-type signature for a declared `fn <: T, ... :>`.
pub fn template_signature(
    type_params: &[String],
    args: &[ast::Param],
    ret: &TypeExpr,
    env: &Environment<Handle<'_>>,
    pos: &SourcePos,
) -> CraeftResult<TemplateType> {
    let arg_tys = args
        .iter()
        .map(|p| template_type_expr(&p.ty, type_params, env, pos))
        .collect::<CraeftResult<Vec<_>>>()?;
    let ret_ty = template_type_expr(ret, type_params, env, pos)?;
    Ok(TemplateType::Function {
        ret: Box::new(ret_ty),
        args: arg_tys,
    })
}

fn template_type_expr(
    ty: &TypeExpr,
    type_params: &[String],
    env: &Environment<Handle<'_>>,
    pos: &SourcePos,
) -> CraeftResult<TemplateType> {
    match ty {
        TypeExpr::Void => Ok(TemplateType::Void),
        TypeExpr::Pointer(inner) => Ok(TemplateType::Pointer(Box::new(template_type_expr(
            inner, type_params, env, pos,
        )?))),
        TypeExpr::Named(name) => {
            if let Some(i) = type_params.iter().position(|p| p == name) {
                return Ok(TemplateType::Parameter(i));
            }
            match env.lookup_type(name, pos)? {
                Type::SignedInt(n) => Ok(TemplateType::SignedInt(*n)),
                Type::UnsignedInt(n) => Ok(TemplateType::UnsignedInt(*n)),
                Type::Float(p) => Ok(TemplateType::Float(*p)),
                Type::Void => Ok(TemplateType::Void),
                other => Err(CraeftError::generic(
                    format!("\"{other}\" cannot appear directly in a template signature"),
                    pos.clone(),
                )),
            }
        }
        TypeExpr::Templated(..) => Err(CraeftError::generic(
            "nested template types in a template signature are not supported",
            pos.clone(),
        )),
    }
}
