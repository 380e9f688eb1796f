use super::Environment;
use super::error::ExpressionError;
use super::value::ExpressionValue;
use phf::phf_map;

/// Built-in functions. Trigonometric functions work in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Abs,
    Acos,
    Asin,
    Atan,
    Cos,
    Exp,
    Ln,
    Log,
    Nint,
    Sin,
    Sqrt,
    Tan,
    Rand,
    RandI,
}

static FUNCTIONS: phf::Map<&'static str, Function> = phf_map! {
    "abs" => Function::Abs,
    "acos" => Function::Acos,
    "asin" => Function::Asin,
    "atan" => Function::Atan,
    "cos" => Function::Cos,
    "exp" => Function::Exp,
    "ln" => Function::Ln,
    "log" => Function::Log,
    "nint" => Function::Nint,
    "sin" => Function::Sin,
    "sqrt" => Function::Sqrt,
    "tan" => Function::Tan,
    "rand" => Function::Rand,
    "randi" => Function::RandI,
};

static CONSTANTS: phf::Map<&'static str, f64> = phf_map! {
    "pi" => std::f64::consts::PI,
};

/// Looks up a named constant, ignoring case.
pub fn constant(name: &str) -> Option<f64> {
    CONSTANTS.get(name.to_ascii_lowercase().as_str()).copied()
}

impl Function {
    /// Looks up a function by name, ignoring case.
    pub fn lookup(name: &str) -> Option<Self> {
        FUNCTIONS.get(name.to_ascii_lowercase().as_str()).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Acos => "acos",
            Self::Asin => "asin",
            Self::Atan => "atan",
            Self::Cos => "cos",
            Self::Exp => "exp",
            Self::Ln => "ln",
            Self::Log => "log",
            Self::Nint => "nint",
            Self::Sin => "sin",
            Self::Sqrt => "sqrt",
            Self::Tan => "tan",
            Self::Rand => "rand",
            Self::RandI => "randi",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Self::Rand => 0,
            Self::RandI => 2,
            _ => 1,
        }
    }

    pub fn is_random(self) -> bool {
        matches!(self, Self::Rand | Self::RandI)
    }

    pub(crate) fn check_arity(self, found: usize) -> Result<(), ExpressionError> {
        if found == self.arity() {
            Ok(())
        } else {
            Err(ExpressionError::Arity {
                function: self.name(),
                expected: self.arity(),
                found,
            })
        }
    }

    pub(crate) fn evaluate(
        self,
        args: &[ExpressionValue],
        env: &mut dyn Environment,
    ) -> Result<ExpressionValue, ExpressionError> {
        self.check_arity(args.len())?;
        let x = || args[0].as_f64();
        let value = match self {
            Self::Abs => match args[0] {
                ExpressionValue::Integer(i) => i
                    .checked_abs()
                    .map(ExpressionValue::Integer)
                    .unwrap_or(ExpressionValue::Double((i as f64).abs())),
                ExpressionValue::Double(d) => ExpressionValue::Double(d.abs()),
            },
            Self::Acos => ExpressionValue::Double(x().acos().to_degrees()),
            Self::Asin => ExpressionValue::Double(x().asin().to_degrees()),
            Self::Atan => ExpressionValue::Double(x().atan().to_degrees()),
            Self::Cos => ExpressionValue::Double(x().to_radians().cos()),
            Self::Sin => ExpressionValue::Double(x().to_radians().sin()),
            Self::Tan => ExpressionValue::Double(x().to_radians().tan()),
            Self::Exp => ExpressionValue::Double(x().exp()),
            Self::Ln => ExpressionValue::Double(x().ln()),
            Self::Log => ExpressionValue::Double(x().log10()),
            Self::Sqrt => ExpressionValue::Double(x().sqrt()),
            Self::Nint => ExpressionValue::Integer((x() + 0.5).floor() as i64),
            Self::Rand => ExpressionValue::Double(env.random_uniform()?),
            Self::RandI => {
                let bound = |v: ExpressionValue| {
                    v.as_integer().ok_or_else(|| {
                        ExpressionError::Type(format!("randi bounds must be integers (got {v})"))
                    })
                };
                let (a, b) = (bound(args[0])?, bound(args[1])?);
                ExpressionValue::Integer(env.random_integer(a.min(b), a.max(b))?)
            }
        };
        Ok(value)
    }
}
