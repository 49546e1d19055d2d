//! Keyword tables for intent extraction.
//!
//! Each table is `(canonical tag, aliases)` in priority order: when several
//! entries match, the earlier one wins. Aliases are written in normalized
//! form (lowercase, punctuation replaced by spaces).

/// An ordered keyword table.
pub type KeywordTable = &'static [(&'static str, &'static [&'static str])];

/// Known misspellings: `(misspelling, canonical tag)`.
pub type MisspellingTable = &'static [(&'static str, &'static str)];

pub const OCCASIONS: KeywordTable = &[
    ("wedding", &["wedding", "weddings", "bridal", "bridesmaid", "wedding guest"]),
    ("party", &["party", "parties", "cocktail", "night out", "clubbing", "birthday"]),
    ("work", &["work", "office", "business", "professional", "interview", "workwear"]),
    ("formal", &["formal", "gala", "black tie", "evening", "prom"]),
    ("date", &["date night", "date"]),
    ("sports", &["sports", "sport", "gym", "workout", "running", "athletic", "yoga", "training"]),
    ("beach", &["beach", "vacation", "resort", "pool", "swim"]),
    ("casual", &["casual", "everyday", "weekend", "relaxed", "lounge", "loungewear"]),
];

pub const OCCASION_MISSPELLINGS: MisspellingTable = &[
    ("weding", "wedding"),
    ("wedd", "wedding"),
    ("partys", "party"),
    ("partie", "party"),
    ("casul", "casual"),
    ("formel", "formal"),
    ("ofice", "work"),
];

pub const AGE_GROUPS: KeywordTable = &[
    ("kids", &["kids", "kid", "children", "child", "toddler", "toddlers", "boys", "girls", "baby"]),
    ("teen", &["teen", "teens", "teenager", "teenagers"]),
    ("senior", &["senior", "seniors", "elderly"]),
    ("adult", &["adult", "adults", "grown up"]),
];

pub const AGE_GROUP_MISSPELLINGS: MisspellingTable = &[
    ("kidz", "kids"),
    ("childern", "kids"),
    ("chidren", "kids"),
    ("todler", "kids"),
    ("teenage", "teen"),
];

pub const CATEGORIES: KeywordTable = &[
    ("women", &["women", "woman", "womens", "ladies", "lady", "female", "feminine"]),
    ("men", &["men", "man", "mens", "male", "gentlemen", "gents", "masculine"]),
    ("kids", &["kids", "children", "childrens"]),
    ("accessories", &["accessories", "accessory", "bag", "bags", "belt", "belts", "hat", "hats", "scarf", "jewelry", "sunglasses", "watches"]),
];

pub const CATEGORY_MISSPELLINGS: MisspellingTable = &[
    ("womans", "women"),
    ("wemen", "women"),
    ("womem", "women"),
    ("mans", "men"),
    ("accesories", "accessories"),
    ("accessorys", "accessories"),
];

pub const COLORS: KeywordTable = &[
    ("red", &["red", "crimson", "scarlet", "burgundy", "maroon"]),
    ("navy", &["navy", "navy blue"]),
    ("blue", &["blue", "cobalt", "denim blue", "sky blue", "teal"]),
    ("black", &["black", "jet black"]),
    ("white", &["white", "ivory", "off white"]),
    ("gray", &["gray", "grey", "charcoal"]),
    ("beige", &["beige", "tan", "khaki", "cream", "nude"]),
    ("green", &["green", "olive", "emerald", "sage"]),
    ("yellow", &["yellow", "mustard"]),
    ("pink", &["pink", "blush", "fuchsia"]),
    ("purple", &["purple", "violet", "lavender", "lilac"]),
    ("orange", &["orange", "coral", "rust"]),
    ("brown", &["brown", "chocolate", "camel"]),
    ("gold", &["gold", "golden"]),
    ("silver", &["silver"]),
];

pub const COLOR_MISSPELLINGS: MisspellingTable = &[
    ("blu", "blue"),
    ("blak", "black"),
    ("balck", "black"),
    ("whte", "white"),
    ("wite", "white"),
    ("purpel", "purple"),
    ("grean", "green"),
    ("yelow", "yellow"),
    ("pnk", "pink"),
];

/// `t-shirt` precedes `shirt` and `shirt` precedes `dress`, so "t shirt" and
/// "dress shirt" resolve to the more specific entry.
pub const CLOTHING_TYPES: KeywordTable = &[
    ("t-shirt", &["t shirt", "t shirts", "tee", "tees"]),
    ("shirt", &["shirt", "shirts", "dress shirt", "button down", "button up", "polo"]),
    ("dress", &["dress", "dresses", "gown", "gowns", "sundress"]),
    ("blouse", &["blouse", "blouses"]),
    ("sweater", &["sweater", "sweaters", "jumper", "pullover", "cardigan", "hoodie", "sweatshirt"]),
    ("jeans", &["jeans", "denim"]),
    ("pants", &["pants", "trousers", "chinos", "slacks", "leggings", "joggers"]),
    ("shorts", &["shorts"]),
    ("skirt", &["skirt", "skirts"]),
    ("blazer", &["blazer", "blazers", "sport coat"]),
    ("jacket", &["jacket", "jackets", "bomber", "windbreaker"]),
    ("coat", &["coat", "coats", "parka", "trench"]),
    ("suit", &["suit", "suits", "tuxedo"]),
    ("shoes", &["shoes", "shoe", "sneakers", "boots", "heels", "sandals", "loafers", "flats"]),
    ("top", &["tops", "tank top", "crop top", "camisole"]),
];

pub const CLOTHING_TYPE_MISSPELLINGS: MisspellingTable = &[
    ("tshirt", "t-shirt"),
    ("tshirts", "t-shirt"),
    ("tshrit", "t-shirt"),
    ("teeshirt", "t-shirt"),
    ("jens", "jeans"),
    ("jeens", "jeans"),
    ("genes", "jeans"),
    ("dres", "dress"),
    ("dresss", "dress"),
    ("drss", "dress"),
    ("shrit", "shirt"),
    ("trowsers", "pants"),
    ("pans", "pants"),
    ("sneekers", "shoes"),
    ("skrit", "skirt"),
];

pub const DRESS_STYLES: KeywordTable = &[
    ("maxi", &["maxi", "floor length"]),
    ("midi", &["midi"]),
    ("mini", &["mini"]),
    ("a-line", &["a line"]),
    ("bodycon", &["bodycon", "body con", "fitted dress"]),
    ("wrap", &["wrap dress"]),
    ("shift", &["shift dress"]),
    ("slip", &["slip dress"]),
    ("fit-and-flare", &["fit and flare", "skater dress"]),
];

pub const DRESS_STYLE_MISSPELLINGS: MisspellingTable = &[("maxy", "maxi"), ("bodycone", "bodycon")];

/// Relationship words that imply a category: "a gift for my wife".
pub const RELATION_CATEGORIES: &[(&str, &[&str])] = &[
    ("women", &["wife", "girlfriend", "daughter", "mom", "mother", "sister", "grandma", "aunt"]),
    ("men", &["husband", "boyfriend", "son", "dad", "father", "brother", "grandpa", "uncle"]),
];

/// Common words never fuzzy-matched against aliases: "good" is not "gold",
/// "sale" is not "sage" and "wore" is not "work".
pub const FUZZY_STOPWORDS: &[&str] = &[
    "about", "also", "back", "bass", "beat", "bell", "bent", "best", "blur", "bolt", "boss",
    "bother", "bush", "buy", "came", "chat", "coal", "cold", "colt", "cool", "cost", "could",
    "dare", "data", "does", "dote", "find", "from", "gale", "gall", "gift", "give",
    "good", "grab", "grad", "gram", "gran", "grew", "has", "hate", "have", "help", "hold",
    "just", "kiss", "know", "lay", "lazy", "like", "look", "looking", "mace", "made", "make",
    "malt", "mane", "many", "mate", "maze", "menu", "mess", "mile", "mind", "mine", "mint",
    "mole", "more", "most", "much", "mule", "need", "nice", "park", "part", "pick", "pine",
    "pint", "please", "pole", "poll", "poor", "price", "prop", "rest", "rise", "rush", "safe",
    "sags", "sake", "sale", "same", "save", "she", "shop", "short", "show", "sit", "size",
    "some", "something", "sort", "spot", "swam", "swig", "swum", "team", "tear", "tell", "ten",
    "than", "that", "them", "then", "these", "they", "this", "those", "ties", "tips", "toes",
    "told", "toss", "want", "wear", "what", "when", "where", "which", "while", "wide", "wile",
    "will", "wine", "wipe", "wire", "wise", "wish", "with", "word", "wore", "worm", "worn",
    "wort", "would", "write", "your",
];
