//! Predefined mappings over the shipped packs.

use std::collections::BTreeMap;

use super::CustomKeyMapping;

struct Predefined {
    name: &'static str,
    description: &'static str,
    entries: &'static [(&'static str, &'static str)],
}

static PREDEFINED: &[Predefined] = &[
    Predefined {
        name: "typeScriptAnalysis",
        description: "Module structure and declarations of TypeScript sources",
        entries: &[
            ("imports", "ts-import-sources"),
            ("namedImports", "ts-named-imports"),
            ("exports", "ts-export-declarations"),
            ("classes", "ts-class-definitions"),
            ("interfaces", "ts-interface-definitions"),
            ("types", "ts-type-aliases"),
            ("functions", "ts-function-definitions"),
        ],
    },
    Predefined {
        name: "reactAnalysis",
        description: "Components and hook usage in React code",
        entries: &[
            ("components", "ts-function-definitions"),
            ("hooks", "ts-react-hooks"),
            ("imports", "ts-import-sources"),
            ("exports", "ts-export-declarations"),
        ],
    },
    Predefined {
        name: "typeAnalysis",
        description: "Type-level declarations",
        entries: &[
            ("interfaces", "ts-interface-definitions"),
            ("typeAliases", "ts-type-aliases"),
            ("classes", "ts-class-definitions"),
        ],
    },
    Predefined {
        name: "moduleAnalysis",
        description: "Module dependencies (ES modules and CommonJS)",
        entries: &[
            ("imports", "ts-import-sources"),
            ("namedImports", "ts-named-imports"),
            ("exports", "ts-export-declarations"),
            ("requires", "js-require-calls"),
        ],
    },
    Predefined {
        name: "legacyCompatibility",
        description: "Older extractor key names",
        entries: &[
            ("import-sources", "ts-import-sources"),
            ("export-declarations", "ts-export-declarations"),
            ("class-definitions", "ts-class-definitions"),
            ("function-definitions", "ts-function-definitions"),
        ],
    },
];

/// Every predefined mapping by name.
pub fn all() -> BTreeMap<&'static str, CustomKeyMapping> {
    PREDEFINED
        .iter()
        .map(|p| (p.name, p.entries.iter().copied().collect()))
        .collect()
}

/// A predefined mapping by name.
pub fn get(name: &str) -> Option<CustomKeyMapping> {
    PREDEFINED
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.entries.iter().copied().collect())
}

/// `(name, description)` of every predefined mapping.
pub fn descriptions() -> impl Iterator<Item = (&'static str, &'static str)> {
    PREDEFINED.iter().map(|p| (p.name, p.description))
}
