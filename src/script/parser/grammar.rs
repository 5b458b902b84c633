use pest_derive::Parser;

/// Parser for the script language.
#[derive(Parser)]
#[grammar = "script/grammar.pest"]
pub struct ScriptParser;
