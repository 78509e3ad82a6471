pub mod backend;
pub mod core;
pub mod query;
pub mod schema;
pub mod stats;

/*
┌──────────────────────────── SCIDB STRUCT ARCHITECTURE ─────────────────────────────┐
│                                                                                     │
│  query text ──> query::parser::compile ──> query::ast::Node                         │
│                                               │                                     │
│                        backend::lower(node, Dialect)                                │
│                        ├── backend::document  (`$`-operator filters)                │
│                        └── backend::search    (bool/term/range filters)             │
│                                               │                                     │
│                              serde_json::Value (native filter)                      │
│                                               │                                     │
│  trait backend::Backend ── find / count / aggregate_distinct / sample_one           │
│        └── backend::memory::MemoryBackend (filter evaluation over documents)        │
│                                               │                                     │
│  core::database::Database ──uses──> schema::classify  (category key-sets)           │
│                            ──uses──> schema::infer    (shape descriptors)           │
│                            ──uses──> stats::histogram (per-type summaries)          │
│                                                                                     │
│  core::types: Value / Record / Derived / FieldCategory                              │
│  query::ast:  Literal / Node                                                        │
│  core::error: Error / Result                                                        │
│                                                                                     │
└─────────────────────────────────────────────────────────────────────────────────────┘
*/
