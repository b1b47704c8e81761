//! Textual rendering of modules.

use std::fmt::{self, Write as _};

use crate::function::{Function, Linkage, Signature};
use crate::instructions::{Callee, Inst, Value};
use crate::module::Module;

/// Render a module as text.
///
/// Globals come first, then external declarations, then functions in
/// definition order.
pub fn dump(module: &Module) -> String {
    let mut out = String::new();
    writeln!(out, "module {}", module.name()).ok();

    let mut globals = module.globals().peekable();
    if globals.peek().is_some() {
        out.push('\n');
    }
    for (name, global) in globals {
        match &global.init {
            Some(init) => writeln!(out, "global {name}: {} = {init}", global.ty),
            None => writeln!(out, "global {name}: {}", global.ty),
        }
        .ok();
    }

    let mut externs = module.externs().peekable();
    if externs.peek().is_some() {
        out.push('\n');
    }
    for (name, sig) in externs {
        writeln!(out, "extern @{name}{}", SignatureDisplay(sig)).ok();
    }

    for function in module.functions() {
        out.push('\n');
        dump_function(&mut out, function);
    }
    out
}

/// Render a single function as text.
pub fn dump_function(out: &mut String, function: &Function) {
    let linkage = match function.linkage {
        Linkage::External => "external",
        Linkage::Internal => "internal",
    };
    write!(out, "fn {linkage} @{}(", function.name).ok();
    for (i, ty) in function.sig.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write!(out, "%{i}: {ty}").ok();
    }
    writeln!(out, ") -> {} {{", function.sig.ret).ok();
    for inst in &function.body {
        writeln!(out, "  {inst}").ok();
    }
    out.push_str("}\n");
}

struct SignatureDisplay<'a>(&'a Signature);

impl fmt::Display for SignatureDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, ty) in self.0.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{ty}")?;
        }
        write!(f, ") -> {}", self.0.ret)
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Value]) -> fmt::Result {
    write!(f, "(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Const { dst, value } => write!(f, "{dst} = const {value}"),
            Inst::Alloca { dst, ty } => write!(f, "{dst} = alloca {ty}"),
            Inst::Load { dst, ty, ptr } => write!(f, "{dst} = load {ty}, {ptr}"),
            Inst::Store { ty, value, ptr } => write!(f, "store {ty} {value}, {ptr}"),
            Inst::MemberPtr {
                dst,
                ty,
                ptr,
                index,
            } => write!(f, "{dst} = member {ty}, {ptr}, {index}"),
            Inst::ElementPtr {
                dst,
                elem,
                ptr,
                index,
            } => write!(f, "{dst} = element {elem}, {ptr}, {index}"),
            Inst::Extract {
                dst,
                aggregate,
                index,
            } => write!(f, "{dst} = extract {aggregate}, {index}"),
            Inst::Insert {
                dst,
                aggregate,
                element,
                index,
            } => write!(f, "{dst} = insert {aggregate}, {element}, {index}"),
            Inst::Binary { dst, op, lhs, rhs } => {
                write!(f, "{dst} = {} {lhs}, {rhs}", op.mnemonic())
            }
            Inst::Unary { dst, op, arg } => write!(f, "{dst} = {} {arg}", op.mnemonic()),
            Inst::Cast { dst, op, arg } => write!(f, "{dst} = {} {arg}", op.mnemonic()),
            Inst::Call { dst, callee, args } => {
                if let Some(dst) = dst {
                    write!(f, "{dst} = ")?;
                }
                match callee {
                    Callee::Direct(name) => write!(f, "call @{name}")?,
                    Callee::Indirect(target) => write!(f, "call {target}")?,
                }
                write_args(f, args)
            }
            Inst::FuncAddr { dst, name } => write!(f, "{dst} = fnaddr @{name}"),
            Inst::GlobalAddr { dst, name } => write!(f, "{dst} = global @{name}"),
            Inst::Return { value: Some(v) } => write!(f, "ret {v}"),
            Inst::Return { value: None } => write!(f, "ret"),
        }
    }
}
