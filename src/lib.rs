//=====================================================
// File: lib.rs
//=====================================================
// Goal: pklrt crate root
// Objective: Expose the trust boundary and bootstrap layer of the
//            configuration-language runtime
//=====================================================

pub mod ast;
pub mod parser;
pub mod resolve;
pub mod runtime;
pub mod security;
pub mod session;
pub mod settings;
pub mod stdlib;
pub mod tokenizer;

//=====================================================
// End of file
//=====================================================
