//! End-to-end builds of small schemas with known outputs

mod common;

use common::*;
use pretty_assertions::assert_eq;
use xsdc::ast::{ElementDecl, Particle, TypeRef};
use xsdc::namespaces::NamespaceContext;
use xsdc::runtime::ids::EnumId;
use xsdc::runtime::models::{iter_bits, ModelKind};
use xsdc::runtime::types::{DerivationMask, ElementFlags};
use xsdc::runtime::validators::FacetOp;
use xsdc::values::{self, ValueKind};
use xsdc::{compile, BuildConfig, ErrorKind};

#[test]
fn test_single_string_root() {
    let schema = build(&single_root("root"));

    let root = global_element(&schema, "root");
    let element = schema.element(root).unwrap();
    let ty = schema.type_def(element.type_id).unwrap();
    assert!(ty.is_simple());
    assert!(ty.validator.is_some());
    assert_eq!(schema.global_elements().len(), 1);
    // Placeholder plus anyType
    assert_eq!(schema.complex_types().len(), 2);

    assert_ne!(schema.build_hash(), 0);
    let again = build(&single_root("root"));
    assert_eq!(again.build_hash(), schema.build_hash());
}

#[test]
fn test_renamed_root_changes_fingerprint() {
    let first = build(&single_root("root"));
    let second = build(&single_root("root2"));
    assert_ne!(first.build_hash(), second.build_hash());
}

#[test]
fn test_local_element_shadows_global() {
    let mut set = schema_set();
    set.add_element(ElementDecl::new(set.qname("a")).with_type(TypeRef::builtin("string")));
    let a = set.add_local_element(ElementDecl::new(set.qname("a")).with_type(TypeRef::builtin("int")));
    let b = set.add_local_element(ElementDecl::new(set.qname("b")).with_type(TypeRef::builtin("string")));
    root_with(
        &mut set,
        Particle::sequence(vec![Particle::local(a), Particle::local(b)]),
    );
    let schema = build(&set);

    let model = model_of(&schema, "root");
    assert_eq!(model.kind, ModelKind::Dfa);
    assert!(accepts(&schema, model, &["a", "b"]));
    assert!(!accepts(&schema, model, &["b", "a"]));

    let matched = first_match(&schema, model, "a").unwrap();
    let global = global_element(&schema, "a");
    assert_ne!(matched, global);
    let local = schema.element(matched).unwrap();
    assert_eq!(local.name, sym(&schema, "a"));
    assert!(!local.flags.contains(ElementFlags::GLOBAL));
    assert_ne!(local.type_id, schema.element(global).unwrap().type_id);
}

fn head_and_tail() -> xsdc::ast::SchemaSet {
    let mut set = schema_set();
    let head = set.add_element(ElementDecl::new(set.qname("head")).with_type(TypeRef::builtin("string")));
    set.add_element(ElementDecl::new(set.qname("m1")).with_substitution_group(head.clone()));
    set.add_element(ElementDecl::new(set.qname("m2")).with_substitution_group(head.clone()));
    let tail = set.add_element(ElementDecl::new(set.qname("tail")).with_type(TypeRef::builtin("string")));
    root_with(
        &mut set,
        Particle::sequence(vec![Particle::element_ref(head), Particle::element_ref(tail)]),
    );
    set
}

#[test]
fn test_substitution_expands_positions() {
    let set = head_and_tail();
    let config = BuildConfig::default().with_max_dfa_states(1);
    let schema = compile(&set, &config).unwrap();
    let model = model_of(&schema, "root");
    assert_eq!(model.kind, ModelKind::Nfa);

    let nfa = &schema.models().nfas[model.index as usize];
    assert_eq!(nfa.matchers.len(), 4);
    assert!(!nfa.nullable);

    let name_of = |p: usize| nfa.matchers[p].sym;
    let mut first: Vec<_> = iter_bits(nfa.bitset(nfa.start)).map(name_of).collect();
    first.sort();
    let mut expected = vec![sym(&schema, "head"), sym(&schema, "m1"), sym(&schema, "m2")];
    expected.sort();
    assert_eq!(first, expected);

    let last: Vec<_> = iter_bits(nfa.bitset(nfa.accept)).map(name_of).collect();
    assert_eq!(last, vec![sym(&schema, "tail")]);

    for p in iter_bits(nfa.bitset(nfa.start)) {
        let follow: Vec<_> = iter_bits(nfa.bitset(nfa.follow[p])).map(name_of).collect();
        assert_eq!(follow, vec![sym(&schema, "tail")]);
    }

    for children in [["head", "tail"], ["m1", "tail"], ["m2", "tail"]] {
        assert!(accepts(&schema, model, &children));
    }
    assert!(!accepts(&schema, model, &["tail"]));
}

#[test]
fn test_substitution_dfa_first_transitions() {
    let schema = build(&head_and_tail());
    let model = model_of(&schema, "root");
    assert_eq!(model.kind, ModelKind::Dfa);

    let dfa = &schema.models().dfas[model.index as usize];
    let first = dfa.transitions(dfa.start);
    assert_eq!(first.len(), 3);
    for t in first {
        let next = dfa.transitions(t.next);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].sym, sym(&schema, "tail"));
        assert!(dfa.accept(next[0].next));
    }
}

#[test]
fn test_abstract_head_with_blocked_substitution() {
    let mut set = schema_set();
    let head = set.add_element(
        ElementDecl::new(set.qname("head"))
            .with_type(TypeRef::builtin("string"))
            .with_abstract(true)
            .with_block(DerivationMask::SUBSTITUTION),
    );
    set.add_element(ElementDecl::new(set.qname("m1")).with_substitution_group(head.clone()));
    root_with(&mut set, Particle::element_ref(head));

    let err = compile(&set, &BuildConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SubstitutionGroup);
}

#[test]
fn test_integer_enumeration_collapses_lexical_forms() {
    let mut set = schema_set();
    let ty = integer_enum(&mut set, "One", &["1", "01", "+1"]);
    set.add_element(ElementDecl::new(set.qname("one")).with_type(ty));
    let schema = build(&set);

    let validator = schema.type_def(global_type(&schema, "One")).unwrap().validator;
    let enum_id = schema
        .facet_program(validator)
        .iter()
        .find(|instr| instr.op == FacetOp::Enumeration)
        .map(|instr| EnumId(instr.arg0))
        .unwrap();
    assert_eq!(schema.enums().members(enum_id).len(), 1);

    let ns = NamespaceContext::new();
    let checker = schema.checker();
    for lexical in ["1", "01", "+1", " 001 "] {
        let checked = checker.check(validator, lexical, &ns).unwrap();
        assert_eq!(checked.canonical, "1");
        let (_, key) = values::canonical::integer(lexical.trim()).unwrap();
        assert!(schema.enum_contains(enum_id, ValueKind::Integer, &key));
    }
    assert!(checker.check(validator, "2", &ns).is_err());
    assert!(checker.check(validator, "-1", &ns).is_err());
}
