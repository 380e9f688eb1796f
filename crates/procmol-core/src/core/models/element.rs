use phf::phf_map;

/// Standard atomic masses (g/mol) keyed by element symbol.
static ATOMIC_MASSES: phf::Map<&'static str, f64> = phf_map! {
    "H" => 1.008,
    "D" => 2.014,
    "He" => 4.0026,
    "Li" => 6.94,
    "Be" => 9.0122,
    "B" => 10.81,
    "C" => 12.011,
    "N" => 14.007,
    "O" => 15.999,
    "F" => 18.998,
    "Ne" => 20.180,
    "Na" => 22.990,
    "Mg" => 24.305,
    "Al" => 26.982,
    "Si" => 28.085,
    "P" => 30.974,
    "S" => 32.06,
    "Cl" => 35.45,
    "Ar" => 39.948,
    "K" => 39.098,
    "Ca" => 40.078,
    "Fe" => 55.845,
    "Cu" => 63.546,
    "Zn" => 65.38,
    "Br" => 79.904,
    "Kr" => 83.798,
    "Ag" => 107.87,
    "I" => 126.90,
    "Xe" => 131.29,
    "Au" => 196.97,
};

/// Returns the atomic mass for an element symbol, if known.
///
/// The lookup is exact first and then retried with the conventional capitalisation
/// (`"CL"` and `"cl"` both resolve to chlorine).
pub fn atomic_mass(symbol: &str) -> Option<f64> {
    if let Some(mass) = ATOMIC_MASSES.get(symbol) {
        return Some(*mass);
    }
    let mut chars = symbol.chars();
    let first = chars.next()?;
    let normalised: String = first
        .to_uppercase()
        .chain(chars.flat_map(|c| c.to_lowercase()))
        .collect();
    ATOMIC_MASSES.get(normalised.as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_symbols_resolve() {
        assert_eq!(atomic_mass("O"), Some(15.999));
        assert_eq!(atomic_mass("H"), Some(1.008));
    }

    #[test]
    fn lookup_normalises_capitalisation() {
        assert_eq!(atomic_mass("CL"), Some(35.45));
        assert_eq!(atomic_mass("cl"), Some(35.45));
    }

    #[test]
    fn unknown_symbol_returns_none() {
        assert_eq!(atomic_mass("Xx"), None);
        assert_eq!(atomic_mass(""), None);
    }
}
