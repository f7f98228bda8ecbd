//! Single-pass bytecode compiler with lexical scope resolution (spec §4.3).
//!
//! Grounded on the teacher's `compiler.rs`/`namespace.rs` shape: a stack of
//! scopes tracks bindings while walking the tree once, variable references
//! resolve against that stack instead of a separate pre-pass, and a block's
//! final namespace size (here, `locals_count`) is only known once its body
//! has finished compiling — exactly the teacher's `Function::namespace_size`
//! being filled in after the body walk. Unlike the teacher, Blocks has no
//! compile-time errors of its own: every reference resolves to a local, an
//! upvalue, or a global fallback, so `compile` is infallible (spec's
//! `BlocksError` has no `Compile` variant).

use std::rc::Rc;

use crate::ast::Expr;
use crate::opcode::Opcode;
use crate::program::{Program, ProgramBuilder};

/// One block's compile-time binding table. Mirrors one runtime `Env` frame
/// one-for-one: `locals[i]` is exactly the name bound at `Env` slot `i`.
struct Scope {
    locals: Vec<Rc<str>>,
}

impl Scope {
    fn with_params(params: &[Rc<str>]) -> Self {
        Self {
            locals: params.to_vec(),
        }
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.locals.iter().position(|n| &**n == name)
    }

    fn declare(&mut self, name: Rc<str>) -> usize {
        let idx = self.locals.len();
        self.locals.push(name);
        idx
    }
}

/// Where a name resolves to, relative to the scope currently compiling.
enum Resolution {
    Local(usize),
    /// `hops` enclosing blocks up, slot `idx` in that block's environment.
    Upvalue { idx: usize, hops: usize },
    Global,
}

#[derive(Default)]
struct Compiler {
    /// Innermost scope last. Empty while compiling top-level statements —
    /// there is no block `Env` frame at top level (spec §3: globals live in
    /// a separate namespace, never on the environment chain).
    scopes: Vec<Scope>,
}

impl Compiler {
    fn resolve_read(&self, name: &str) -> Resolution {
        for (hops, scope) in self.scopes.iter().rev().enumerate() {
            if let Some(idx) = scope.find(name) {
                return if hops == 0 {
                    Resolution::Local(idx)
                } else {
                    Resolution::Upvalue { idx, hops }
                };
            }
        }
        Resolution::Global
    }

    /// Same search as [`Compiler::resolve_read`], except an unmatched name
    /// declares a brand-new local in the *innermost* scope rather than
    /// falling back to a global — but only when we're inside at least one
    /// block. An unmatched write at true top level still targets a global
    /// (spec §4.3: "a write to a name not yet in scope declares a new local
    /// in the current block"; at top level there is no enclosing block, so
    /// the write is a global assignment instead).
    fn resolve_write(&mut self, name: &Rc<str>) -> Resolution {
        for (hops, scope) in self.scopes.iter().rev().enumerate() {
            if let Some(idx) = scope.find(name) {
                return if hops == 0 {
                    Resolution::Local(idx)
                } else {
                    Resolution::Upvalue { idx, hops }
                };
            }
        }
        match self.scopes.last_mut() {
            Some(innermost) => Resolution::Local(innermost.declare(name.clone())),
            None => Resolution::Global,
        }
    }

    fn compile_expr(&mut self, b: &mut ProgramBuilder, expr: &Expr, tail: bool) {
        b.set_line(expr.line());
        match expr {
            Expr::Int(n, _) => {
                let idx = b.intern_int(*n);
                b.emit1(Opcode::PushConst, idx);
            }
            Expr::Str(s, _) => {
                let idx = b.intern_str(s.clone());
                b.emit1(Opcode::PushConst, idx);
            }
            Expr::Var(name, _) => self.compile_load(b, name),
            Expr::Assign { name, value, .. } => self.compile_assign(b, name, value),
            Expr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => self.compile_if(b, cond, then_branch, else_branch, tail),
            Expr::BinOp { op, lhs, rhs, .. } => {
                self.compile_expr(b, lhs, false);
                self.compile_expr(b, rhs, false);
                let idx = b.intern_op(op.clone());
                b.emit1(Opcode::BinaryOp, idx);
            }
            Expr::Block { params, body, .. } => self.compile_block(b, params, body),
            Expr::Call { callee, args, .. } => self.compile_call(b, callee, args, tail),
        }
    }

    fn compile_load(&self, b: &mut ProgramBuilder, name: &Rc<str>) {
        match self.resolve_read(name) {
            Resolution::Local(idx) => b.emit1(Opcode::LoadLocal, idx as i32),
            Resolution::Upvalue { idx, hops } => {
                b.emit2(Opcode::LoadUpvalue, idx as i32, hops as i32);
            }
            Resolution::Global => {
                let idx = b.intern_name(name.clone());
                b.emit1(Opcode::LoadGlobal, idx);
            }
        }
    }

    /// An assignment's value is never in tail position: even when the
    /// assignment is the last expression of a block body, a store (and,
    /// for the block's own last statement, a `Return`) still has to happen
    /// after the value is computed, so the call inside it cannot reuse the
    /// caller's frame the way a bare tail call can.
    fn compile_assign(&mut self, b: &mut ProgramBuilder, name: &Rc<str>, value: &Expr) {
        // Self-recursion support (spec §4.3/§9): for `name = [ ... ]`,
        // resolve (and, if new, declare) the binding *before* compiling
        // the block body, so the body can call itself by name. For every
        // other RHS shape, compile the RHS first so a read of `name`
        // inside it still sees the *outer* binding — e.g. `x = x + 1`
        // must read the outer `x` before the new/mutated slot is chosen.
        let resolution = if matches!(value, Expr::Block { .. }) {
            let resolution = self.resolve_write(name);
            self.compile_expr(b, value, false);
            resolution
        } else {
            self.compile_expr(b, value, false);
            self.resolve_write(name)
        };
        match resolution {
            Resolution::Local(idx) => b.emit1(Opcode::StoreLocal, idx as i32),
            Resolution::Upvalue { idx, hops } => {
                b.emit2(Opcode::StoreUpvalue, idx as i32, hops as i32);
            }
            Resolution::Global => {
                let idx = b.intern_name(name.clone());
                b.emit1(Opcode::StoreGlobal, idx);
            }
        }
    }

    fn compile_if(
        &mut self,
        b: &mut ProgramBuilder,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: &Expr,
        tail: bool,
    ) {
        self.compile_expr(b, cond, false);
        let to_else = b.emit_jump(Opcode::JumpIfF);
        self.compile_expr(b, then_branch, tail);
        let to_end = b.emit_jump(Opcode::Jump);
        b.patch_jump(to_else);
        self.compile_expr(b, else_branch, tail);
        b.patch_jump(to_end);
    }

    /// A zero-argument call compiles to `CallIfClosure`/`TailCallIfClosure`
    /// instead of `Call`/`TailCall` with `argc = 0`: the "if closure"
    /// opcodes invoke a callable target and pass a non-callable one through
    /// unchanged, rather than faulting, and that graceful behavior is only
    /// sound when there are no arguments to strand on a failed invocation.
    /// A call carrying arguments that targets something non-callable has
    /// nowhere to put those arguments, so it must fault instead.
    fn compile_call(&mut self, b: &mut ProgramBuilder, callee: &Expr, args: &[Expr], tail: bool) {
        self.compile_expr(b, callee, false);
        for arg in args {
            self.compile_expr(b, arg, false);
        }
        if args.is_empty() {
            let op = if tail {
                Opcode::TailCallIfClosure
            } else {
                Opcode::CallIfClosure
            };
            b.emit0(op);
        } else {
            let op = if tail { Opcode::TailCall } else { Opcode::Call };
            b.emit1(op, args.len() as i32);
        }
    }

    fn compile_block(&mut self, b: &mut ProgramBuilder, params: &[Rc<str>], body: &[Expr]) {
        let params_rc: Rc<[Rc<str>]> = Rc::from(params);
        let params_idx = b.intern_params(params_rc.clone());
        let make_block_addr = b.here();
        // Entry address and locals count are placeholders, patched once the
        // body (which may implicitly declare more locals) has compiled.
        b.emit3(Opcode::MakeBlock, params_idx, -1, -1);
        let skip_body = b.emit_jump(Opcode::Jump);
        let entry_addr = b.here();

        self.scopes.push(Scope::with_params(params));
        self.compile_body(b, body);
        b.emit0(Opcode::Return);
        let locals_count = self.scopes.pop().expect("scope pushed above").locals.len();

        b.patch_jump(skip_body);
        b.patch_operand(make_block_addr + 2, entry_addr as i32);
        b.patch_operand(make_block_addr + 3, locals_count as i32);
    }

    /// Compiles a sequence of expressions, discarding every intermediate
    /// result and leaving only the last one's value on the stack (an empty
    /// body evaluates to `Nil`, per spec §4.3).
    fn compile_body(&mut self, b: &mut ProgramBuilder, body: &[Expr]) {
        match body.split_last() {
            None => {
                let idx = b.intern_nil();
                b.emit1(Opcode::PushConst, idx);
            }
            Some((last, init)) => {
                for expr in init {
                    self.compile_expr(b, expr, false);
                    b.emit0(Opcode::Pop);
                }
                self.compile_expr(b, last, true);
            }
        }
    }
}

/// Compiles a parsed program into bytecode. Infallible: every name
/// resolves to a local, an upvalue, or a global fallback (spec §4.3).
#[must_use]
pub fn compile(statements: &[Expr]) -> Program {
    let mut compiler = Compiler::default();
    let mut b = ProgramBuilder::new();
    match statements.split_last() {
        None => {
            let idx = b.intern_nil();
            b.emit1(Opcode::PushConst, idx);
        }
        Some((last, init)) => {
            for expr in init {
                compiler.compile_expr(&mut b, expr, false);
                b.emit0(Opcode::Pop);
            }
            compiler.compile_expr(&mut b, last, false);
        }
    }
    b.emit0(Opcode::Halt);
    b.build()
}
