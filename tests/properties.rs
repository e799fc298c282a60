//! Invariants every successful build must satisfy

mod common;

use std::collections::HashSet;

use common::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use xsdc::ast::{
    AttributeDecl, AttributeGroupDef, AttributeUseDef, ComplexTypeDef, ElementDecl, Facet,
    NamespaceConstraint, NamespaceItem, Particle, SchemaSet, SimpleTypeDef, TypeRef, WildcardDef,
};
use xsdc::namespaces::{NamespaceContext, QName};
use xsdc::runtime::ids::{ElementId, WildcardId};
use xsdc::runtime::models::ModelKind;
use xsdc::runtime::types::DerivationMask;
use xsdc::runtime::Schema;
use xsdc::{compile, BuildConfig};

/// A schema touching most tables: derived types, attributes, a
/// substitution group, an enumeration and a wildcard
fn mixed_schema(root: &str, type_name: &str) -> SchemaSet {
    let mut set = schema_set();
    let code = integer_enum(&mut set, "Code", &["1", "2", "3"]);
    let base = set.add_type(
        set.qname(type_name),
        ComplexTypeDef::new()
            .with_attribute(AttributeUseDef::local(AttributeDecl::new(QName::local("id"))).required())
            .with_attribute(
                AttributeUseDef::local(AttributeDecl::new(QName::local("code")).with_type(code.clone()))
                    .with_default("1"),
            ),
    );
    let item = set.add_local_element(ElementDecl::new(set.qname("item")).with_type(code));
    let derived = set.add_type(
        set.qname("Derived"),
        ComplexTypeDef::extension(base.clone(), Some(Particle::local(item).with_occurs(0, Some(3))))
            .with_attribute(AttributeUseDef::local(AttributeDecl::new(QName::local("extra"))))
            .with_any_attribute(WildcardDef::new(NamespaceConstraint::Other, Some(TNS))),
    );
    let head = set.add_element(ElementDecl::new(set.qname("entry")).with_type(base));
    set.add_element(
        ElementDecl::new(set.qname("special"))
            .with_type(derived)
            .with_substitution_group(head.clone()),
    );
    let ty = set.add_anonymous_type(ComplexTypeDef::with_particle(Particle::sequence(vec![
        Particle::element_ref(head).with_occurs(1, None),
        Particle::any(WildcardDef::new(
            NamespaceConstraint::List(vec![NamespaceItem::Local, NamespaceItem::Uri("urn:other".into())]),
            Some(TNS),
        ))
        .with_occurs(0, Some(1)),
    ])));
    set.add_element(ElementDecl::new(set.qname(root)).with_type(ty));
    set
}

fn ncname() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,8}"
}

#[test]
fn test_builds_are_deterministic() {
    let set = mixed_schema("root", "Base");
    let first = build(&set);
    let second = build(&set);
    assert_eq!(first.build_hash(), second.build_hash());
    assert_eq!(first.namespaces(), second.namespaces());
    assert_eq!(first.symbols(), second.symbols());
    assert_eq!(first.types(), second.types());
    assert_eq!(first.elements(), second.elements());
    assert_eq!(first.models(), second.models());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_renaming_changes_fingerprint(a in ncname(), b in ncname()) {
        prop_assume!(a != b);
        prop_assume!(![&a, &b].iter().any(|n| ["entry", "special"].contains(&n.as_str())));
        let first = build(&mixed_schema(&a, "Base"));
        let second = build(&mixed_schema(&b, "Base"));
        prop_assert_ne!(first.build_hash(), second.build_hash());

        let renamed_type = build(&mixed_schema(&a, &format!("T{}", b)));
        prop_assert_ne!(first.build_hash(), renamed_type.build_hash());
    }
}

#[test]
fn test_ids_are_dense() {
    let schema = build(&mixed_schema("root", "Base"));
    let (types, complex, validators) = (
        schema.types().len(),
        schema.complex_types().len(),
        schema.validators().len(),
    );

    for ty in &schema.types()[1..] {
        assert!(ty.base.index() < types);
        assert!(ty.validator.index() < validators);
        assert!((ty.complex as usize) < complex);
        assert!(ty.name.index() < schema.symbols().len());
    }
    for elem in &schema.elements()[1..] {
        assert!(schema.type_def(elem.type_id).is_some());
        assert!(elem.name.is_some() && elem.name.index() < schema.symbols().len());
        if elem.subst_head.is_some() {
            assert!(schema.element(elem.subst_head).is_some());
        }
    }
    for (sym, id) in schema.global_elements() {
        assert_eq!(schema.element(*id).map(|e| e.name), Some(*sym));
    }
    for i in 1..schema.wildcards().len() {
        assert!(schema.wildcards().rule(WildcardId::from_index(i)).is_some());
    }
}

#[test]
fn test_ancestors_start_with_base() {
    let schema = build(&mixed_schema("root", "Base"));
    for (i, ty) in schema.types().iter().enumerate().skip(1) {
        let id = xsdc::runtime::ids::TypeId::from_index(i);
        let ancestors: Vec<_> = schema.ancestors(id).map(|(t, _)| t).collect();
        assert!(ancestors.len() < schema.types().len());
        match ty.base.get() {
            Some(base) if base != id => assert_eq!(ancestors.first(), Some(&base)),
            _ => assert!(ancestors.is_empty()),
        }
    }

    let derived = global_type(&schema, "Derived");
    let base = global_type(&schema, "Base");
    assert_eq!(schema.derivation(derived, base), Some(DerivationMask::EXTENSION));
    assert!(schema.is_derived_from(derived, schema.any_type()));
}

#[test]
fn test_attribute_uses_are_unique() {
    let schema = build(&mixed_schema("root", "Base"));
    for ct in &schema.complex_types()[1..] {
        let uses = schema.attribute_uses(ct);
        let names: HashSet<_> = uses.iter().map(|u| u.name).collect();
        assert_eq!(names.len(), uses.len());
    }

    let derived = schema.complex_type(global_type(&schema, "Derived")).unwrap();
    assert_eq!(schema.attribute_uses(derived).len(), 3);
    assert!(derived.has_any_attribute());
}

#[test]
fn test_dfa_transitions_are_sorted() {
    let schema = build(&mixed_schema("root", "Base"));
    for dfa in &schema.models().dfas {
        for state in 0..dfa.states.len() as u32 {
            let syms: Vec<_> = dfa.transitions(state).iter().map(|t| t.sym).collect();
            assert!(syms.windows(2).all(|w| w[0] < w[1]), "{:?}", syms);
            let rules: Vec<_> = dfa.wild_edges(state).iter().map(|e| e.rule).collect();
            assert!(rules.windows(2).all(|w| w[0] < w[1]));
        }
    }
}

/// `root` holding `head*, tail` where `head` has `members` substitutes
fn substitution_chain(members: usize) -> SchemaSet {
    let mut set = schema_set();
    let head = set.add_element(ElementDecl::new(set.qname("head")).with_type(TypeRef::builtin("string")));
    for i in 0..members {
        set.add_element(
            ElementDecl::new(set.qname(&format!("m{}", i))).with_substitution_group(head.clone()),
        );
    }
    let tail = set.add_element(ElementDecl::new(set.qname("tail")));
    root_with(
        &mut set,
        Particle::sequence(vec![
            Particle::element_ref(head).with_occurs(0, None),
            Particle::element_ref(tail),
        ]),
    );
    set
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_state_cap_falls_back_to_positions(members in 0usize..6) {
        let set = substitution_chain(members);
        let config = BuildConfig::default().with_max_dfa_states(1);
        let schema = compile(&set, &config).unwrap();
        let model = model_of(&schema, "root");
        prop_assert_eq!(model.kind, ModelKind::Nfa);
        let nfa = &schema.models().nfas[model.index as usize];
        prop_assert_eq!(nfa.matchers.len(), members + 2);
        prop_assert_eq!(nfa.follow.len(), members + 2);

        let unbounded = build(&set);
        let model = model_of(&unbounded, "root");
        prop_assert_eq!(model.kind, ModelKind::Dfa);
        let last = format!("m{}", members.saturating_sub(1));
        let children = if members == 0 { vec!["head", "tail"] } else { vec!["head", last.as_str(), "tail"] };
        prop_assert!(accepts(&unbounded, model, &children));
        prop_assert!(accepts(&schema, model_of(&schema, "root"), &children));
    }

    #[test]
    fn test_enumeration_round_trip(
        values in proptest::collection::btree_set(-1000i64..1000, 1..8),
        zeros in 0usize..3,
        candidate in -1000i64..1000,
    ) {
        let lexical: Vec<String> = values
            .iter()
            .map(|v| {
                let pad = "0".repeat(zeros);
                if *v < 0 { format!("-{}{}", pad, -v) } else { format!("+{}{}", pad, v) }
            })
            .collect();
        let refs: Vec<&str> = lexical.iter().map(String::as_str).collect();
        let mut set = schema_set();
        let ty = integer_enum(&mut set, "E", &refs);
        set.add_element(ElementDecl::new(set.qname("e")).with_type(ty));
        let schema = build(&set);

        let validator = schema.type_def(global_type(&schema, "E")).unwrap().validator;
        let checker = schema.checker();
        let ns = NamespaceContext::new();
        for (v, lex) in values.iter().zip(&lexical) {
            let checked = checker.check(validator, lex, &ns).unwrap();
            prop_assert_eq!(checked.canonical, v.to_string());
        }
        let accepted = checker.check(validator, &candidate.to_string(), &ns).is_ok();
        prop_assert_eq!(accepted, values.contains(&candidate));
    }
}

fn namespace_item() -> impl Strategy<Value = NamespaceItem> {
    prop_oneof![
        Just(NamespaceItem::Local),
        Just(NamespaceItem::TargetNamespace),
        "urn:[a-c]".prop_map(NamespaceItem::Uri),
    ]
}

fn namespace_constraint() -> impl Strategy<Value = NamespaceConstraint> {
    prop_oneof![
        Just(NamespaceConstraint::Any),
        Just(NamespaceConstraint::Other),
        proptest::collection::vec(namespace_item(), 0..4).prop_map(NamespaceConstraint::List),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_wildcard_forms_agree(constraints in proptest::collection::vec(namespace_constraint(), 1..4)) {
        let mut set = schema_set();
        let particles = constraints
            .iter()
            .map(|c| Particle::any(WildcardDef::new(c.clone(), Some(TNS))).with_occurs(0, Some(1)))
            .collect();
        let ty = set.add_anonymous_type(
            ComplexTypeDef::with_particle(Particle::sequence(particles))
                .with_any_attribute(WildcardDef::new(constraints[0].clone(), Some(TNS))),
        );
        set.add_element(ElementDecl::new(set.qname("root")).with_type(ty));
        let schema = build(&set);

        let table = schema.namespaces();
        for i in 1..schema.wildcards().len() {
            let rule = WildcardId::from_index(i);
            for ns in table.ids() {
                let uri = table.get(ns).unwrap();
                prop_assert_eq!(
                    schema.wildcard_accepts(rule, ns),
                    schema.wildcard_accepts_uri(rule, uri),
                    "rule {} namespace {:?}", i, table.get_str(ns)
                );
            }
        }
    }
}

/// One substitution-group member: abstract, and typed by an extension
/// of the head's type
#[derive(Debug, Clone, Copy)]
struct Member {
    is_abstract: bool,
    extends: bool,
}

fn closure_schema(head_abstract: bool, block_extension: bool, members: &[Member]) -> SchemaSet {
    let mut set = schema_set();
    let base = set.add_type(set.qname("Base"), ComplexTypeDef::new());
    let ext = set.add_type(set.qname("Ext"), ComplexTypeDef::extension(base.clone(), None));
    let mut head = ElementDecl::new(set.qname("head"))
        .with_type(base)
        .with_abstract(head_abstract);
    if block_extension {
        head = head.with_block(DerivationMask::EXTENSION);
    }
    let head = set.add_element(head);
    for (i, m) in members.iter().enumerate() {
        let mut decl = ElementDecl::new(set.qname(&format!("m{}", i)))
            .with_substitution_group(head.clone())
            .with_abstract(m.is_abstract);
        if m.extends {
            decl = decl.with_type(ext.clone());
        }
        set.add_element(decl);
    }
    root_with(&mut set, Particle::element_ref(head));
    set
}

fn matched(schema: &Schema, child: &str) -> Option<ElementId> {
    first_match(schema, model_of(schema, "root"), child)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_closure_covers_allowed_members(
        head_abstract in any::<bool>(),
        block_extension in any::<bool>(),
        members in proptest::collection::vec(
            (any::<bool>(), any::<bool>()).prop_map(|(is_abstract, extends)| Member { is_abstract, extends }),
            0..5,
        ),
    ) {
        let schema = build(&closure_schema(head_abstract, block_extension, &members));

        prop_assert_eq!(matched(&schema, "head").is_some(), !head_abstract);
        for (i, m) in members.iter().enumerate() {
            let name = format!("m{}", i);
            let expected = !m.is_abstract && !(m.extends && block_extension);
            let hit = matched(&schema, &name);
            prop_assert_eq!(hit.is_some(), expected, "member {:?}", m);
            if let Some(elem) = hit {
                prop_assert_eq!(elem, global_element(&schema, &name));
            }
        }
    }
}

#[test]
fn test_simple_type_chain_validators() {
    let mut set = schema_set();
    let short = set.add_type(
        set.qname("Short"),
        SimpleTypeDef::restriction(TypeRef::builtin("string"), vec![Facet::MaxLength(3)]),
    );
    let list = set.add_type(set.qname("Shorts"), SimpleTypeDef::list(short));
    set.add_element(ElementDecl::new(set.qname("s")).with_type(list));
    let schema = build(&set);

    let validator = schema.type_def(global_type(&schema, "Shorts")).unwrap().validator;
    let ns = NamespaceContext::new();
    let checker = schema.checker();
    assert_eq!(checker.check(validator, "  ab   c ", &ns).unwrap().canonical, "ab c");
    assert!(checker.check(validator, "abcd", &ns).is_err());
}

/// Particle shape over the globals `a` and `b` and two wildcards
#[derive(Debug, Clone)]
enum Shape {
    Elem(&'static str),
    /// `##any` when true, `##targetNamespace` otherwise
    Any(bool),
    Seq(Vec<Shape>),
    Choice(Vec<Shape>),
    Repeat(Box<Shape>, u32, Option<u32>),
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = prop_oneof![
        Just(Shape::Elem("a")),
        Just(Shape::Elem("b")),
        any::<bool>().prop_map(Shape::Any),
    ];
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 1..4).prop_map(Shape::Seq),
            proptest::collection::vec(inner.clone(), 1..4).prop_map(Shape::Choice),
            (inner, 0u32..2, proptest::option::of(1u32..3)).prop_map(|(s, min, max)| {
                Shape::Repeat(Box::new(s), min, max.map(|m| m.max(min)))
            }),
        ]
    })
}

fn to_particle(set: &SchemaSet, shape: &Shape) -> Particle {
    match shape {
        Shape::Elem(name) => Particle::element_ref(set.qname(name)),
        Shape::Any(true) => Particle::any(WildcardDef::any()),
        Shape::Any(false) => Particle::any(WildcardDef::new(
            NamespaceConstraint::List(vec![NamespaceItem::TargetNamespace]),
            Some(TNS),
        )),
        Shape::Seq(items) => Particle::sequence(items.iter().map(|s| to_particle(set, s)).collect()),
        Shape::Choice(items) => Particle::choice(items.iter().map(|s| to_particle(set, s)).collect()),
        Shape::Repeat(inner, min, max) => to_particle(set, inner).with_occurs(*min, *max),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_position_automaton_matches_dfa(
        shape in shape(),
        children in proptest::collection::vec(prop_oneof![Just("a"), Just("b"), Just("c")], 0..6),
    ) {
        let mut set = schema_set();
        for name in ["a", "b", "c"] {
            set.add_element(ElementDecl::new(set.qname(name)).with_type(TypeRef::builtin("string")));
        }
        let particle = to_particle(&set, &shape);
        root_with(&mut set, particle);

        let dfa_schema = build(&set);
        let nfa_schema = compile(&set, &BuildConfig::default().with_max_dfa_states(1)).unwrap();
        let dfa = model_of(&dfa_schema, "root");
        let nfa = model_of(&nfa_schema, "root");
        prop_assert_ne!(dfa.kind, ModelKind::Nfa);

        let mut left = dfa_schema.cursor(dfa);
        let mut right = nfa_schema.cursor(nfa);
        let mut alive = true;
        for child in &children {
            let l = left.step(sym(&dfa_schema, child));
            let r = right.step(sym(&nfa_schema, child));
            prop_assert_eq!(l, r, "child {} of {:?}", child, children);
            if l.is_none() {
                alive = false;
                break;
            }
        }
        if alive {
            prop_assert_eq!(left.accepting(), right.accepting());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_attribute_group_references_expand_once(
        edges in proptest::collection::vec(proptest::collection::vec(0usize..4, 0..4), 4),
        roots in proptest::collection::vec(0usize..4, 1..4),
    ) {
        let mut set = schema_set();
        let names: Vec<QName> = (0..4).map(|i| set.qname(&format!("G{}", i))).collect();
        for (i, targets) in edges.iter().enumerate() {
            let mut group = AttributeGroupDef::new().with_attribute(AttributeUseDef::local(
                AttributeDecl::new(QName::local(format!("g{}", i))),
            ));
            for t in targets {
                group = group.with_attribute_group(names[*t].clone());
            }
            set.add_attribute_group(names[i].clone(), group);
        }
        let mut def = ComplexTypeDef::new();
        for r in &roots {
            def = def.with_attribute_group(names[*r].clone());
        }
        set.add_type(set.qname("T"), def);
        let schema = build(&set);

        let mut reached = HashSet::new();
        let mut stack = roots.clone();
        while let Some(g) = stack.pop() {
            if reached.insert(g) {
                stack.extend(edges[g].iter().copied());
            }
        }
        let ct = schema.complex_type(global_type(&schema, "T")).unwrap();
        prop_assert_eq!(schema.attribute_uses(ct).len(), reached.len());
        for g in &reached {
            let name = schema.symbol("", &format!("g{}", g)).unwrap();
            prop_assert!(schema.attribute_use(ct, name).is_some());
        }
    }

    #[test]
    fn test_derived_enumeration_within_base(
        base in proptest::collection::btree_set(0i64..10, 1..6),
        derived in proptest::collection::btree_set(0i64..10, 1..6),
    ) {
        let mut set = schema_set();
        let base_values: Vec<String> = base.iter().map(i64::to_string).collect();
        let refs: Vec<&str> = base_values.iter().map(String::as_str).collect();
        let parent = integer_enum(&mut set, "Parent", &refs);
        set.add_type(
            set.qname("Child"),
            SimpleTypeDef::restriction(
                parent,
                derived.iter().map(|v| Facet::Enumeration(v.to_string())).collect(),
            ),
        );

        match compile(&set, &BuildConfig::default()) {
            Ok(schema) => {
                prop_assert!(derived.is_subset(&base));
                let validator = schema.type_def(global_type(&schema, "Child")).unwrap().validator;
                let ns = NamespaceContext::new();
                for v in 0i64..10 {
                    let ok = schema.checker().check(validator, &v.to_string(), &ns).is_ok();
                    prop_assert_eq!(ok, derived.contains(&v), "value {}", v);
                }
            }
            Err(err) => {
                prop_assert!(!derived.is_subset(&base));
                prop_assert_eq!(err.kind(), xsdc::ErrorKind::LexicalValue);
            }
        }
    }
}
