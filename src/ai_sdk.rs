mod gemini;

pub(crate) use gemini::*;
