//! Complex types
//!
//! Each complex type is compiled after its base. The effective particle and
//! attribute set of every compiled type are kept so that derived types can
//! extend or restrict them. A default or fixed value of the character
//! content is inherited from a complex base and re-checked against the
//! derived text validator; a fixed value cannot change.

use super::attributes::AttrSet;
use super::wildcards::Wildcard;
use super::{Compiler, TypeSource};
use crate::ast::{
    ComplexContent, ComplexTypeDef, Facet, Particle, ProcessContents, TypeDef, WildcardDef,
};
use crate::error::{Error, Result, ResultExt, TableError};
use crate::runtime::ids::{TypeId, ValidatorId};
use crate::runtime::types::{
    ComplexType, ConstraintMode, ContentKind, DerivationMethod, ValueConstraint,
};

impl Compiler<'_> {
    /// Compile a complex type and return its index in the complex-type table
    pub(super) fn complex_type(&mut self, id: TypeId) -> Result<u32> {
        let ty = self.types[id.index()];
        if ty.complex != 0 {
            return Ok(ty.complex);
        }
        let label = self.label(id).to_string();
        if !self.complex_visiting.insert(id) {
            return Err(Error::SchemaStructural(format!("{} derives from itself", label)));
        }
        let result = self.complex_body(id).with_context(|| label);
        self.complex_visiting.remove(&id);
        let ct = result?;

        self.complex_types.push(ct);
        let index = self.complex_types.len() as u32 - 1;
        let record = &mut self.types[id.index()];
        record.complex = index;
        if ct.content == ContentKind::Simple {
            record.validator = ct.text_validator;
        }
        Ok(index)
    }

    fn complex_body(&mut self, id: TypeId) -> Result<ComplexType> {
        let def = match self.sources[id.index()] {
            TypeSource::User(TypeDef::Complex(def)) => def,
            TypeSource::Builtin(_) if id == self.any_type => return self.any_type_body(),
            _ => {
                return Err(TableError::MalformedTable(format!(
                    "{} is not a complex type",
                    self.label(id)
                ))
                .into())
            }
        };
        let ty = self.types[id.index()];
        let (base, derivation) = (ty.base, ty.derivation);
        if !self.types[base.index()].is_simple() {
            self.complex_type(base)?;
        }

        let mut ct = ComplexType {
            mixed: def.mixed,
            ..ComplexType::default()
        };
        match &def.content {
            ComplexContent::Simple { facets } => {
                ct.text_validator = self.simple_content(base, derivation, facets)?;
                ct.content = ContentKind::Simple;
                ct.mixed = false;
            }
            ComplexContent::Particle(own) => {
                let particle = self.effective_particle(base, derivation, def.mixed, own.as_ref())?;
                let (content, model) = self.content_model(particle.as_ref(), def.mixed)?;
                self.effective_particles.insert(id, particle);
                ct.content = content;
                ct.model = model;
            }
        }
        ct.text_value = self.text_value(base, def, &ct).with_context(|| "text value")?;

        let attrs = self.complex_attributes(base, derivation, def)?;
        ct.attributes = self.attribute_index(&attrs);
        if let Some(wildcard) = &attrs.wildcard {
            ct.any_attribute = self.wildcard_rule(wildcard)?;
        }
        self.effective_attributes.insert(id, attrs);
        Ok(ct)
    }

    /// anyType: mixed, any elements and any attributes, laxly
    fn any_type_body(&mut self) -> Result<ComplexType> {
        let particle = Particle::any(WildcardDef::any().with_process_contents(ProcessContents::Lax))
            .with_occurs(0, None);
        let (content, model) = self.content_model(Some(&particle), true)?;
        self.effective_particles.insert(self.any_type, Some(particle));

        let wildcard = Wildcard::any_lax();
        let any_attribute = self.wildcard_rule(&wildcard)?;
        self.effective_attributes.insert(
            self.any_type,
            AttrSet {
                wildcard: Some(wildcard),
                ..AttrSet::default()
            },
        );
        Ok(ComplexType {
            content,
            any_attribute,
            model,
            mixed: true,
            ..ComplexType::default()
        })
    }

    /// Default or fixed value of the character content, own or inherited
    fn text_value(
        &mut self,
        base: TypeId,
        def: &ComplexTypeDef,
        ct: &ComplexType,
    ) -> Result<ValueConstraint> {
        let own_given = def.text_default.is_some() || def.text_fixed.is_some();
        let validator = match ct.content {
            ContentKind::Simple => ct.text_validator,
            _ if ct.mixed => self.types[self.any_simple_type.index()].validator,
            _ if own_given => {
                return Err(Error::SchemaStructural(
                    "a text value needs simple or mixed content".to_string(),
                ))
            }
            _ => return Ok(ValueConstraint::default()),
        };
        let base_ty = self.types[base.index()];
        let inherited = if base_ty.is_simple() {
            ValueConstraint::default()
        } else {
            self.complex_types[base_ty.complex as usize].text_value
        };

        if own_given {
            let own = self.value_constraint(
                validator,
                def.text_default.as_deref(),
                def.text_fixed.as_deref(),
            )?;
            if inherited.mode != ConstraintMode::Fixed {
                return Ok(own);
            }
            if !self.same_value(&own, &inherited) {
                return Err(Error::Derivation(format!(
                    "text value must keep the fixed value of {}",
                    self.label(base)
                )));
            }
            return Ok(ValueConstraint {
                mode: ConstraintMode::Fixed,
                ..own
            });
        }

        let lexical = match self.values.get(inherited.canonical) {
            Some(bytes) if inherited.is_present() => String::from_utf8_lossy(bytes).into_owned(),
            _ => return Ok(ValueConstraint::default()),
        };
        let (default, fixed) = match inherited.mode {
            ConstraintMode::Fixed => (None, Some(lexical.as_str())),
            _ => (Some(lexical.as_str()), None),
        };
        self.value_constraint(validator, default, fixed)
            .with_context(|| format!("value inherited from {}", self.label(base)))
    }

    fn simple_content(
        &mut self,
        base: TypeId,
        derivation: DerivationMethod,
        facets: &[Facet],
    ) -> Result<ValidatorId> {
        let base_ty = self.types[base.index()];
        let inherited = if base_ty.is_simple() {
            if derivation != DerivationMethod::Extension {
                return Err(Error::SchemaStructural(format!(
                    "simple content restriction needs a complex base, {} is a simple type",
                    self.label(base)
                )));
            }
            base_ty.validator
        } else {
            let base_ct = self.complex_types[base_ty.complex as usize];
            if base_ct.content != ContentKind::Simple {
                return Err(Error::SchemaStructural(format!(
                    "{} does not have simple content",
                    self.label(base)
                )));
            }
            base_ct.text_validator
        };
        match derivation {
            DerivationMethod::Extension if !facets.is_empty() => Err(Error::SchemaStructural(
                "facets are not allowed when extending simple content".to_string(),
            )),
            DerivationMethod::Extension => Ok(inherited),
            _ => self.restrict(inherited, facets),
        }
    }

    /// Extension appends the own particle to the base's; restriction
    /// replaces it
    fn effective_particle(
        &self,
        base: TypeId,
        derivation: DerivationMethod,
        mixed: bool,
        own: Option<&Particle>,
    ) -> Result<Option<Particle>> {
        if derivation != DerivationMethod::Extension {
            return Ok(own.cloned());
        }
        let base_ty = self.types[base.index()];
        if base_ty.is_simple() {
            return Err(Error::SchemaStructural(format!(
                "element content cannot extend simple type {}",
                self.label(base)
            )));
        }
        let base_ct = self.complex_types[base_ty.complex as usize];
        if base_ct.content == ContentKind::Simple {
            return Err(Error::SchemaStructural(format!(
                "element content cannot extend {}, it has simple content",
                self.label(base)
            )));
        }
        let inherited = self.effective_particles.get(&base).cloned().flatten();
        if inherited.is_some() && base_ct.mixed != mixed {
            return Err(Error::Derivation(format!(
                "extension of {} must keep its mixed setting",
                self.label(base)
            )));
        }
        Ok(match (inherited, own) {
            (None, own) => own.cloned(),
            (Some(inherited), None) => Some(inherited),
            (Some(inherited), Some(own)) => Some(Particle::sequence(vec![inherited, own.clone()])),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{
        AttributeDecl, AttributeUseDef, ComplexTypeDef, ElementDecl, Facet, Particle, RangeBound,
        SchemaSet, TypeRef,
    };
    use crate::compiler::compile;
    use crate::error::ErrorKind;
    use crate::limits::BuildConfig;
    use crate::namespaces::{NamespaceContext, QName};
    use crate::runtime::models::ModelKind;
    use crate::runtime::types::{ComplexType, ConstraintMode, ContentKind};
    use crate::runtime::Schema;

    fn complex<'s>(schema: &'s Schema, local: &str) -> &'s ComplexType {
        let id = schema
            .lookup_type(schema.symbol("urn:t", local).unwrap())
            .unwrap();
        schema.complex_type(id).unwrap()
    }

    fn accepts(schema: &Schema, ct: &ComplexType, children: &[&str]) -> bool {
        let mut cursor = schema.cursor(ct.model);
        children.iter().all(|c| {
            schema
                .symbol("urn:t", c)
                .map_or(false, |sym| cursor.step(sym).is_some())
        }) && cursor.accepting()
    }

    #[test]
    fn test_any_type_is_lax_and_mixed() {
        let schema = compile(&SchemaSet::new(None), &BuildConfig::default()).unwrap();
        let ct = schema.complex_type(schema.any_type()).unwrap();
        assert_eq!(ct.content, ContentKind::Mixed);
        assert!(ct.mixed);
        assert!(ct.has_any_attribute());
        assert_eq!(ct.model.kind, ModelKind::Dfa);
        assert!(schema.complex_types().len() == 2);
    }

    #[test]
    fn test_extension_appends_particle() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let a = set.add_local_element(ElementDecl::new(set.qname("a")));
        let b = set.add_local_element(ElementDecl::new(set.qname("b")));
        let base = set.add_type(
            set.qname("Base"),
            ComplexTypeDef::with_particle(Particle::sequence(vec![Particle::local(a)])),
        );
        set.add_type(
            set.qname("Ext"),
            ComplexTypeDef::extension(base, Some(Particle::sequence(vec![Particle::local(b)]))),
        );
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let ext = complex(&schema, "Ext");
        assert_eq!(ext.content, ContentKind::ElementOnly);
        assert!(accepts(&schema, ext, &["a", "b"]));
        assert!(!accepts(&schema, ext, &["b"]));
        assert!(accepts(&schema, complex(&schema, "Base"), &["a"]));
    }

    #[test]
    fn test_extension_keeps_mixed() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let a = set.add_local_element(ElementDecl::new(set.qname("a")));
        let base = set.add_type(
            set.qname("Base"),
            ComplexTypeDef::with_particle(Particle::local(a)).with_mixed(true),
        );
        set.add_type(set.qname("Ext"), ComplexTypeDef::extension(base, None));
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Derivation);
    }

    #[test]
    fn test_simple_content_restriction() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let base = set.add_type(
            set.qname("Amount"),
            ComplexTypeDef::simple_extension(TypeRef::builtin("int")).with_attribute(
                AttributeUseDef::local(AttributeDecl::new(QName::local("currency"))).required(),
            ),
        );
        set.add_type(
            set.qname("Small"),
            ComplexTypeDef::simple_restriction(
                base,
                vec![Facet::Range(RangeBound::MaxInclusive, "10".to_string())],
            ),
        );
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let small = complex(&schema, "Small");
        assert_eq!(small.content, ContentKind::Simple);
        assert_eq!(schema.attribute_uses(small).len(), 1);
        let ns = NamespaceContext::new();
        let checker = schema.checker();
        assert!(checker.check(small.text_validator, "7", &ns).is_ok());
        assert!(checker.check(small.text_validator, "11", &ns).is_err());
        let amount = complex(&schema, "Amount");
        assert!(checker.check(amount.text_validator, "11", &ns).is_ok());
    }

    #[test]
    fn test_simple_content_needs_simple_base() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let base = set.add_type(set.qname("Empty"), ComplexTypeDef::new());
        set.add_type(set.qname("Bad"), ComplexTypeDef::simple_extension(base));
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);

        let mut set = SchemaSet::new(Some("urn:t"));
        set.add_type(
            set.qname("Bad"),
            ComplexTypeDef::simple_restriction(TypeRef::builtin("string"), vec![]),
        );
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);
    }

    #[test]
    fn test_restriction_replaces_particle() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let a = set.add_local_element(ElementDecl::new(set.qname("a")));
        let base = set.add_type(
            set.qname("Base"),
            ComplexTypeDef::with_particle(Particle::local(a).with_occurs(0, None)),
        );
        set.add_type(set.qname("None"), ComplexTypeDef::restriction(base, None));
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let none = complex(&schema, "None");
        assert_eq!(none.content, ContentKind::Empty);
        assert_eq!(none.model.kind, ModelKind::Empty);
    }

    #[test]
    fn test_text_value_is_canonical_and_inherited() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let price = set.add_type(
            set.qname("Price"),
            ComplexTypeDef::simple_extension(TypeRef::builtin("decimal")).with_text_default("01.50"),
        );
        set.add_type(
            set.qname("Cheap"),
            ComplexTypeDef::simple_restriction(
                price.clone(),
                vec![Facet::Range(RangeBound::MaxInclusive, "10".to_string())],
            ),
        );
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        for name in ["Price", "Cheap"] {
            let ct = complex(&schema, name);
            assert_eq!(ct.text_value.mode, ConstraintMode::Default);
            assert_eq!(schema.values().get_str(ct.text_value.canonical), Some("1.5"));
        }
        let summary = crate::inspect::SchemaSummary::from_schema(&schema);
        let cheap = summary.types.iter().find(|t| t.name == "{urn:t}Cheap").unwrap();
        assert_eq!(cheap.text_value.as_deref(), Some("1.5"));

        set.add_type(
            set.qname("Tiny"),
            ComplexTypeDef::simple_restriction(
                price,
                vec![Facet::Range(RangeBound::MaxInclusive, "1".to_string())],
            ),
        );
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LexicalValue);
    }

    #[test]
    fn test_fixed_text_value_cannot_change() {
        let fixed_base = |derived: ComplexTypeDef| {
            let mut set = SchemaSet::new(Some("urn:t"));
            let base = set.add_type(
                set.qname("Code"),
                ComplexTypeDef::simple_extension(TypeRef::builtin("int")).with_text_fixed("7"),
            );
            let derived = ComplexTypeDef { base: Some(base), ..derived };
            set.add_type(set.qname("Derived"), derived);
            compile(&set, &BuildConfig::default())
        };

        let same = ComplexTypeDef::simple_restriction(TypeRef::builtin("int"), vec![])
            .with_text_default("+007");
        let schema = fixed_base(same).unwrap();
        let derived = complex(&schema, "Derived");
        assert_eq!(derived.text_value.mode, ConstraintMode::Fixed);
        assert_eq!(schema.values().get_str(derived.text_value.canonical), Some("7"));

        let other = ComplexTypeDef::simple_restriction(TypeRef::builtin("int"), vec![])
            .with_text_fixed("8");
        assert_eq!(fixed_base(other).unwrap_err().kind(), ErrorKind::Derivation);
    }

    #[test]
    fn test_text_value_needs_text_content() {
        let mut set = SchemaSet::new(Some("urn:t"));
        let a = set.add_local_element(ElementDecl::new(set.qname("a")));
        set.add_type(
            set.qname("Mixed"),
            ComplexTypeDef::with_particle(Particle::local(a).with_occurs(0, None))
                .with_mixed(true)
                .with_text_default("note"),
        );
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        let mixed = complex(&schema, "Mixed");
        assert_eq!(schema.values().get_str(mixed.text_value.canonical), Some("note"));

        let mut set = SchemaSet::new(Some("urn:t"));
        set.add_type(set.qname("Empty"), ComplexTypeDef::new().with_text_default("x"));
        let err = compile(&set, &BuildConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaStructural);

        let mut set = SchemaSet::new(Some("urn:t"));
        let base = set.add_type(set.qname("Plain"), ComplexTypeDef::new());
        set.add_type(set.qname("Derived"), ComplexTypeDef::restriction(base, None));
        let schema = compile(&set, &BuildConfig::default()).unwrap();
        assert!(!complex(&schema, "Derived").text_value.is_present());
    }
}
