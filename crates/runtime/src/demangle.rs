//! Decoder for the language's mangled symbol names.
//!
//! Mangled symbols start with `_W` (or `__W` when the platform prepends an
//! extra underscore) followed by a kind character and a prefix-coded,
//! length-prefixed body. The decoder turns them back into source-form names
//! for stack traces; anything it does not understand is reported as failure
//! so the caller can fall back to the host demangler.

/// Builtin type codes reachable through the `s` type prefix. `i` is handled
/// in the grammar because of its optional width suffix (`si`, `si32`, ...).
const SPECIAL_TYPES: &[(u8, &str)] = &[
    (b'a', "Any"),
    (b'b', "Bool"),
    (b'd', "Double"),
    (b'f', "Float"),
    (b'S', "String"),
    (b'v', "Void"),
];

/// Operator function codes reachable through the `O` function kind.
const OPERATORS: &[(u8, &str)] = &[
    (b'p', "+"),
    (b'm', "-"),
    (b't', "*"),
    (b'd', "/"),
    (b'r', "%"),
    (b'e', "=="),
    (b'n', "!="),
    (b'l', "<"),
    (b'L', "<="),
    (b'g', ">"),
    (b'G', ">="),
    (b'a', "&&"),
    (b'o', "||"),
    (b'N', "!"),
    (b'A', "&"),
    (b'O', "|"),
    (b'x', "^"),
    (b's', "<<"),
    (b'S', ">>"),
];

fn special_type(code: u8) -> Option<&'static str> {
    SPECIAL_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

fn operator(code: u8) -> Option<&'static str> {
    OPERATORS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Demangle `symbol`, or `None` if it is not a well-formed mangled name.
pub fn demangle(symbol: &str) -> Option<String> {
    let body = symbol
        .strip_prefix("_W")
        .or_else(|| symbol.strip_prefix("__W"))?;
    let mut cursor = Cursor::new(body.as_bytes());
    let mut out = String::new();
    match cursor.bump()? {
        // Closure symbols are not demangled; see the grammar notes.
        b'C' => return None,
        b'F' => cursor.function(&mut out)?,
        b'T' => cursor.read_type(&mut out)?,
        b'g' => cursor.global("accessor", &mut out)?,
        b'G' => cursor.global("initializer", &mut out)?,
        b'W' => cursor.witness_table(&mut out)?,
        b'P' => cursor.protocol(&mut out)?,
        _ => return None,
    }
    Some(out)
}

struct Cursor<'a> {
    input: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(input: &'a [u8]) -> Self {
        Cursor { input }
    }

    fn peek(&self) -> Option<u8> {
        self.input.first().copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let (first, rest) = self.input.split_first()?;
        self.input = rest;
        Some(*first)
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.input = &self.input[1..];
            true
        } else {
            false
        }
    }

    fn read_num(&mut self) -> Option<usize> {
        let digits = self.input.iter().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let num = std::str::from_utf8(&self.input[..digits])
            .ok()?
            .parse()
            .ok()?;
        self.input = &self.input[digits..];
        Some(num)
    }

    fn read_name(&mut self, out: &mut String) -> Option<()> {
        let len = self.read_num()?;
        if self.input.len() < len {
            return None;
        }
        out.push_str(std::str::from_utf8(&self.input[..len]).ok()?);
        self.input = &self.input[len..];
        Some(())
    }

    fn read_type(&mut self, out: &mut String) -> Option<()> {
        if self.eat(b'P') {
            let stars = self.read_num()?;
            for _ in 0..stars {
                out.push('*');
            }
            if !self.eat(b'T') {
                return None;
            }
        }
        if self.eat(b'F') {
            let mut args = Vec::new();
            while self.peek()? != b'R' {
                let mut arg = String::new();
                self.read_type(&mut arg)?;
                args.push(arg);
            }
            self.bump();
            out.push('(');
            out.push_str(&args.join(", "));
            out.push_str(") -> ");
            self.read_type(out)?;
        } else if self.eat(b'A') {
            let mut element = String::new();
            self.read_type(&mut element)?;
            out.push('[');
            out.push_str(&element);
            out.push(']');
        } else if self.eat(b't') {
            let mut fields = Vec::new();
            while self.peek()? != b'T' {
                let mut field = String::new();
                self.read_type(&mut field)?;
                fields.push(field);
            }
            self.bump();
            out.push('(');
            out.push_str(&fields.join(", "));
            out.push(')');
        } else if self.eat(b's') {
            if self.eat(b'i') {
                out.push_str("Int");
                if let Some(width) = self.read_num() {
                    out.push_str(&width.to_string());
                }
            } else {
                out.push_str(special_type(self.bump()?)?);
            }
        } else {
            self.read_name(out)?;
        }
        Some(())
    }

    fn read_arg(&mut self, out: &mut String) -> Option<()> {
        let single_name = self.eat(b'S');
        let mut external = String::new();
        if !single_name && self.eat(b'E') {
            self.read_name(&mut external)?;
        }
        let mut internal = String::new();
        self.read_name(&mut internal)?;
        let mut ty = String::new();
        self.read_type(&mut ty)?;
        if !single_name {
            if external.is_empty() {
                external.push('_');
            }
            out.push_str(&external);
            out.push(' ');
        }
        out.push_str(&internal);
        out.push_str(": ");
        out.push_str(&ty);
        Some(())
    }

    fn function(&mut self, out: &mut String) -> Option<()> {
        if self.eat(b'D') {
            self.read_type(out)?;
            out.push_str(".deinit");
            return Some(());
        }
        if self.eat(b'M') {
            self.read_type(out)?;
            out.push('.');
            self.read_name(out)?;
        } else if self.eat(b'm') {
            out.push_str("static ");
            self.read_type(out)?;
            out.push('.');
            self.read_name(out)?;
        } else if self.eat(b'g') {
            // Accessors render as a property signature, with no arg list.
            out.push_str("getter for ");
            self.read_type(out)?;
            out.push('.');
            self.read_name(out)?;
            out.push_str(": ");
            self.read_type(out)?;
            return Some(());
        } else if self.eat(b's') {
            out.push_str("setter for ");
            self.read_type(out)?;
            out.push('.');
            self.read_name(out)?;
            out.push_str(": ");
            self.read_type(out)?;
            return Some(());
        } else if self.eat(b'I') {
            self.read_type(out)?;
            out.push_str(".init");
        } else if self.eat(b'S') {
            self.read_type(out)?;
            out.push_str(".subscript");
        } else if self.eat(b'O') {
            out.push_str(operator(self.bump()?)?);
        } else {
            self.read_name(out)?;
        }

        let mut args = Vec::new();
        while let Some(c) = self.peek() {
            if c == b'R' {
                break;
            }
            let mut arg = String::new();
            self.read_arg(&mut arg)?;
            args.push(arg);
        }
        out.push('(');
        out.push_str(&args.join(", "));
        out.push(')');
        if self.eat(b'R') {
            out.push_str(" -> ");
            self.read_type(out)?;
        }
        if self.eat(b'C') {
            out.push_str(" (closure #1)");
        }
        Some(())
    }

    fn global(&mut self, kind: &str, out: &mut String) -> Option<()> {
        out.push_str(kind);
        out.push_str(" for global ");
        self.read_name(out)
    }

    fn witness_table(&mut self, out: &mut String) -> Option<()> {
        out.push_str("witness table for ");
        self.read_name(out)?;
        out.push_str(" to ");
        self.read_name(out)
    }

    fn protocol(&mut self, out: &mut String) -> Option<()> {
        out.push_str("protocol ");
        self.read_name(out)
    }
}

#[cfg(test)]
mod tests {
    use super::demangle;

    fn check(symbol: &str, expected: &str) {
        assert_eq!(demangle(symbol).as_deref(), Some(expected), "{}", symbol);
    }

    #[test]
    fn functions_with_labeled_args() {
        check("_WF3fooS4namesi", "foo(name: Int)");
        check("_WF3foo1xsi", "foo(_ x: Int)");
        check("_WF4sortE2by10comparatorFsbRsv", "sort(by comparator: (Bool) -> Void)");
    }

    #[test]
    fn deinitializers() {
        check("_WFD5Point", "Point.deinit");
    }

    #[test]
    fn methods_and_static_methods() {
        check("_WFM5Point9translateS2dxsiS2dysi", "Point.translate(dx: Int, dy: Int)");
        check("_WFm5Point4make", "static Point.make()");
    }

    #[test]
    fn property_accessors_have_no_arg_list() {
        check("_WFg5Point1xsi", "getter for Point.x: Int");
        check("_WFs5Point1xsi", "setter for Point.x: Int");
    }

    #[test]
    fn initializers_and_subscripts() {
        check("_WFI5Point1xsi1ysi", "Point.init(_ x: Int, _ y: Int)");
        check("_WFS5Array3idxsi", "Array.subscript(_ idx: Int)");
    }

    #[test]
    fn operator_functions() {
        check("_WFOp1asi1bsiRsi", "+(_ a: Int, _ b: Int) -> Int");
        check("_WFOe1asb1bsbRsb", "==(_ a: Bool, _ b: Bool) -> Bool");
    }

    #[test]
    fn return_types_and_closure_tags() {
        check("_WF3fooRsv", "foo() -> Void");
        check("_WF3fooRsvC", "foo() -> Void (closure #1)");
        // A closure tag is only recognized after a return type.
        assert_eq!(demangle("_WF3fooC"), None);
    }

    #[test]
    fn type_symbols() {
        check("_WT5Point", "Point");
        check("_WTsi", "Int");
        check("_WTsi32", "Int32");
        check("_WTsb", "Bool");
        check("_WTsv", "Void");
        check("_WTsf", "Float");
        check("_WTsd", "Double");
        check("_WTsS", "String");
        check("_WTsa", "Any");
        check("_WTA5Point", "[Point]");
        check("_WTtsisbT", "(Int, Bool)");
        check("_WTP2T5Point", "**Point");
        check("_WTFsiRsb", "(Int) -> Bool");
    }

    #[test]
    fn globals_witness_tables_and_protocols() {
        check("_Wg7counter", "accessor for global counter");
        check("_WG7counter", "initializer for global counter");
        check("_WW5Point9Equatable", "witness table for Point to Equatable");
        check("_WP9Equatable", "protocol Equatable");
    }

    #[test]
    fn underscored_prefix_variant() {
        check("__WP9Equatable", "protocol Equatable");
        check("__WFD5Point", "Point.deinit");
    }

    #[test]
    fn closure_symbols_are_not_demangled() {
        assert_eq!(demangle("_WC3foo"), None);
    }

    #[test]
    fn malformed_symbols_fail() {
        assert_eq!(demangle(""), None);
        assert_eq!(demangle("main"), None);
        assert_eq!(demangle("_W"), None);
        assert_eq!(demangle("_WQ3foo"), None);
        // Truncated length-prefixed name.
        assert_eq!(demangle("_WF9ab"), None);
        // Unknown special type and operator codes.
        assert_eq!(demangle("_WTsz"), None);
        assert_eq!(demangle("_WFOq"), None);
        // Pointer prefix without its terminator.
        assert_eq!(demangle("_WTP25Point"), None);
        // Unterminated tuple and function types.
        assert_eq!(demangle("_WTtsisb"), None);
        assert_eq!(demangle("_WTFsi"), None);
    }
}
