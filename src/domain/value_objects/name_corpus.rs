//! Static corpora the name registry and structured-random filling draw from

use serde::{Deserialize, Serialize};

/// Which name component a corpus serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameKind {
    First,
    Middle,
    Last,
}

impl NameKind {
    pub const ALL: [NameKind; 3] = [Self::First, Self::Middle, Self::Last];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Middle => "middle",
            Self::Last => "last",
        }
    }

    /// Map an attribute key onto a name component, if it is one
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "first" | "first_name" => Some(Self::First),
            "middle" | "middle_name" | "middle_names" => Some(Self::Middle),
            "last" | "last_name" | "surname" => Some(Self::Last),
            _ => None,
        }
    }

    pub fn corpus(&self) -> &'static [&'static str] {
        match self {
            Self::First => FIRST_NAMES,
            Self::Middle => MIDDLE_NAMES,
            Self::Last => LAST_NAMES,
        }
    }
}

impl std::fmt::Display for NameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const FIRST_NAMES: &[&str] = &[
    "Ada", "Adrian", "Alma", "Amara", "Ansel", "Astrid", "August", "Beatrix", "Bennett", "Bram",
    "Calla", "Cassius", "Celeste", "Cyrus", "Dalia", "Declan", "Delphine", "Dorian", "Edith",
    "Elias", "Elodie", "Emmett", "Esme", "Ezra", "Farah", "Felix", "Fiona", "Gideon", "Greta",
    "Hana", "Harlan", "Hazel", "Idris", "Imogen", "Ines", "Isaac", "Jonah", "Josephine", "Jude",
    "Juniper", "Kai", "Keziah", "Lars", "Leona", "Lionel", "Lucia", "Mabel", "Malik", "Marisol",
    "Milo", "Nadia", "Nico", "Noor", "Odette", "Oren", "Otis", "Paloma", "Percy", "Priya",
    "Quentin", "Rafael", "Rosalind", "Rowan", "Saoirse", "Silas", "Soren", "Tamsin", "Theo",
    "Thea", "Ulric", "Valentina", "Vera", "Wendell", "Wren", "Xavier", "Yara", "Yusuf", "Zadie",
    "Zeke", "Zora",
];

pub const MIDDLE_NAMES: &[&str] = &[
    "Alden", "Anne", "Blaise", "Bree", "Cole", "Dawn", "Dean", "Eve", "Faye", "Finn", "Grace",
    "Grey", "Hope", "Hugh", "Iris", "Jade", "James", "Jean", "Joy", "Kit", "Lane", "Lee", "Lynn",
    "Mae", "Marie", "Max", "Neil", "Nell", "Noel", "Paige", "Pearl", "Quinn", "Ray", "Reid",
    "Rose", "Ruth", "Sage", "Scott", "Shane", "Skye", "Tate", "Tess", "Troy", "Vale", "Wade",
    "West", "Wynn", "Blair", "Brooke", "Drew", "Ellis", "Fern", "Gale", "Hale", "Jules", "June",
    "Lark", "Reese", "Sloane", "Vaughn",
];

pub const LAST_NAMES: &[&str] = &[
    "Abernathy", "Achebe", "Alvarez", "Ashworth", "Bakshi", "Barrow", "Beaumont", "Blackwood",
    "Bramley", "Calloway", "Castellano", "Chandra", "Corrigan", "Dalton", "Delacroix", "Draper",
    "Duarte", "Eastwick", "Ellison", "Esposito", "Fairbanks", "Falkner", "Fennimore", "Fitzroy",
    "Galloway", "Garrick", "Gonzaga", "Greaves", "Halloran", "Hartwell", "Hayashi", "Holloway",
    "Ibarra", "Ingram", "Iwasaki", "Jansen", "Jovanovic", "Kaplan", "Kavanagh", "Kingsley",
    "Kowalski", "Lachance", "Lindqvist", "Lockhart", "Lowell", "Mahoney", "Marlowe", "Mbeki",
    "Merriweather", "Montague", "Nakamura", "Navarro", "Nightingale", "Novak", "Oakley",
    "Okafor", "Olsen", "Ortega", "Pemberton", "Petrov", "Pryce", "Quintero", "Quayle",
    "Radcliffe", "Ramirez", "Ravensworth", "Rhodes", "Salazar", "Sato", "Sinclair", "Stroud",
    "Sutherland", "Tanaka", "Thorne", "Townsend", "Underhill", "Ustinov", "Valdez", "Vance",
    "Vasquez", "Waverly", "Whitlock", "Winslow", "Wolfe", "Xiong", "Yamada", "Yardley",
    "Yilmaz", "Zamora", "Zeller", "Ashby", "Brightwater", "Crane", "Dunmore", "Everly",
    "Foxworth", "Gallagher", "Hollis", "Keene", "Larkspur",
];

pub const OCCUPATIONS: &[&str] = &[
    "accountant", "archivist", "baker", "barista", "bookbinder", "cartographer", "carpenter",
    "chemist", "clockmaker", "courier", "dentist", "detective", "electrician", "farmer",
    "ferry pilot", "florist", "glassblower", "harbor master", "historian", "journalist",
    "lawyer", "librarian", "lighthouse keeper", "locksmith", "mechanic", "midwife", "musician",
    "nurse", "painter", "paramedic", "pharmacist", "photographer", "physician", "plumber",
    "professor", "schoolteacher", "sculptor", "tailor", "translator", "veterinarian",
];

/// Brand names are one prefix joined to one suffix (`"Tidewell"` + `"Works"`)
pub const BRAND_PREFIXES: &[&str] = &[
    "Anchor", "Beacon", "Brightline", "Cobalt", "Driftwood", "Ember", "Harbor", "Keystone",
    "Lantern", "Meridian", "Northgate", "Orchard", "Pinecrest", "Quarry", "Saltmarsh",
    "Silverleaf", "Tidewell", "Summit",
];

pub const BRAND_SUFFIXES: &[&str] = &[
    "Works", "Goods", "Labs", "Supply", "Foods", "Motors", "Systems", "Outfitters", "Media",
    "Mills", "Co", "Logistics",
];

/// Inclusive bounds for structured-random ages
pub const AGE_RANGE: (i64, i64) = (18, 80);

/// Most middle names a generated character receives
pub const MAX_MIDDLE_NAMES: usize = 2;
