//! Materialisation of a module's metadata into the catalog's type model.
//!
//! [`ModuleMetadata::read`] walks the metadata root, the heaps and the tables of one image and
//! produces everything the catalog needs: the assembly identity, the list of referenced
//! assemblies, the assembly-level string attributes and every declared type with its base
//! type, interfaces, generic parameters and nesting.
//!
//! # Partial failures
//!
//! Types are materialised one by one. A type whose row, name or nesting chain is broken is
//! dropped and counted in [`ModuleMetadata::failed_types`]; the remaining types are still
//! returned. A base type or interface that can not be expressed in the type model (for
//! example an array or a generic parameter) is silently omitted from that type.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, warn};

use crate::{
    image::ModuleImage,
    metadata::{
        identity::{public_key_token, AssemblyIdentity, AssemblyVersion},
        root::Root,
        signatures::{parse_generic_instance, parse_string_attribute},
        streams::{Blob, Strings},
        tables::{
            AssemblyRaw, AssemblyRefRaw, CodedIndex, CustomAttributeRaw, GenericParamRaw,
            InterfaceImplRaw, MemberRefRaw, ModuleRaw, NestedClassRaw, TableId, TablesHeader,
            TypeDefRaw, TypeRefRaw, TypeSpecRaw,
        },
        token::Token,
        typedef::{full_name, ExternalType, TypeAttributes, TypeDef, TypeReference, TypeScope},
    },
    Error::{self, NotSupported, OutOfBounds, RecursionLimit},
    Result,
};

/// Deepest chain of nested types or nested type references that is followed.
pub const MAX_NESTING_DEPTH: usize = 64;

/// Name of the pseudo type holding module-level members.
const MODULE_TYPE: &str = "<Module>";

/// `AssemblyFlags.PublicKey`: the reference blob holds a full key rather than a token.
const ASSEMBLY_REF_FULL_KEY: u32 = 0x0001;

const EMPTY_HEAP: [u8; 1] = [0];

/// Assembly-level string attributes (`AssemblyTitleAttribute` and friends).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyAttributes {
    /// `AssemblyTitleAttribute`
    pub title: Option<String>,
    /// `AssemblyCompanyAttribute`
    pub company: Option<String>,
    /// `AssemblyDescriptionAttribute`
    pub description: Option<String>,
    /// `AssemblyProductAttribute`
    pub product: Option<String>,
    /// `AssemblyCopyrightAttribute`
    pub copyright: Option<String>,
    /// `AssemblyInformationalVersionAttribute`
    pub informational_version: Option<String>,
}

impl AssemblyAttributes {
    fn set(&mut self, attribute: &str, value: String) {
        let slot = match attribute {
            "AssemblyTitleAttribute" => &mut self.title,
            "AssemblyCompanyAttribute" => &mut self.company,
            "AssemblyDescriptionAttribute" => &mut self.description,
            "AssemblyProductAttribute" => &mut self.product,
            "AssemblyCopyrightAttribute" => &mut self.copyright,
            "AssemblyInformationalVersionAttribute" => &mut self.informational_version,
            _ => return,
        };

        if slot.is_none() {
            *slot = Some(value);
        }
    }
}

/// The materialised metadata of one module.
#[derive(Debug, Clone)]
pub struct ModuleMetadata {
    /// Identity of the assembly (or of the module, for modules without a manifest)
    pub identity: AssemblyIdentity,
    /// File name recorded in the `Module` table
    pub module_name: String,
    /// Runtime version string of the metadata root
    pub runtime_version: String,
    /// Referenced assemblies, in table order
    pub references: Vec<AssemblyIdentity>,
    /// Assembly-level string attributes
    pub attributes: AssemblyAttributes,
    types: Vec<Option<Arc<TypeDef>>>,
    failed_types: usize,
}

impl ModuleMetadata {
    /// Read the metadata of a parsed image from its file bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for images without metadata, and an error if the
    /// metadata root, the heaps or the tables header are broken.
    pub fn read(data: &[u8], image: &ModuleImage) -> Result<ModuleMetadata> {
        let Some(location) = image.metadata else {
            return Err(NotSupported);
        };

        let end = location.offset.checked_add(location.size).ok_or(OutOfBounds)?;
        let Some(metadata) = data.get(location.offset..end) else {
            return Err(OutOfBounds);
        };

        ModuleMetadata::from_metadata(metadata)
    }

    /// Read metadata starting at the metadata root.
    ///
    /// # Errors
    /// Returns an error if the metadata root, the heaps or the tables header are broken.
    pub fn from_metadata(metadata: &[u8]) -> Result<ModuleMetadata> {
        let root = Root::read(metadata)?;

        let strings = Strings::from(
            root.stream(metadata, "#Strings")
                .ok_or_else(|| malformed_error!("Missing #Strings heap"))?,
        )?;
        let blob = Blob::from(root.stream(metadata, "#Blob").unwrap_or(&EMPTY_HEAP))?;
        let tables = root
            .stream(metadata, "#~")
            .or_else(|| root.stream(metadata, "#-"))
            .ok_or_else(|| malformed_error!("Missing tables stream"))?;
        let header = TablesHeader::from(tables)?;

        let reader = Reader::new(&strings, &blob, &header);
        let module_name = reader.module_name();
        let identity = reader.identity(&module_name)?;
        let references = reader.references();
        let attributes = reader.attributes(&references);
        let (types, failed_types) = reader.types(&references);

        Ok(ModuleMetadata {
            identity,
            module_name,
            runtime_version: root.version,
            references,
            attributes,
            types,
            failed_types,
        })
    }

    /// The declared type with `token`, if it materialised.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&Arc<TypeDef>> {
        if token.table() != TableId::TypeDef as u8 || token.row() == 0 {
            return None;
        }

        self.types.get(token.row() as usize - 1)?.as_ref()
    }

    /// All materialised types in table order, without the `<Module>` pseudo type.
    pub fn types(&self) -> impl Iterator<Item = &Arc<TypeDef>> {
        self.types
            .iter()
            .flatten()
            .filter(|type_def| !(type_def.token.row() == 1 && type_def.name == MODULE_TYPE))
    }

    /// Materialised types that are not nested in another type.
    pub fn top_level_types(&self) -> impl Iterator<Item = &Arc<TypeDef>> {
        self.types().filter(|type_def| !type_def.is_nested())
    }

    /// Number of types that failed to materialise.
    #[must_use]
    pub fn failed_types(&self) -> usize {
        self.failed_types
    }

    /// Find a type by full name (`Namespace.Outer+Inner`).
    ///
    /// An exact match wins; with `ignore_case` an ASCII case-insensitive match is accepted
    /// when no exact match exists.
    #[must_use]
    pub fn find_type(&self, name: &str, ignore_case: bool) -> Option<&Arc<TypeDef>> {
        self.types()
            .find(|type_def| type_def.full_name == name)
            .or_else(|| {
                if ignore_case {
                    self.types()
                        .find(|type_def| type_def.full_name.eq_ignore_ascii_case(name))
                } else {
                    None
                }
            })
    }

    /// Find the declaration an [`ExternalType`] names, if this module declares it.
    #[must_use]
    pub fn find_external(&self, external: &ExternalType) -> Option<&Arc<TypeDef>> {
        self.find_type(&external.full_name(), false)
    }

    /// `true` if this module lists `name` among its assembly references.
    #[must_use]
    pub fn references_assembly(&self, name: &str) -> bool {
        self.references
            .iter()
            .any(|reference| reference.same_name(name))
    }
}

/// Per-row data gathered before types are materialised.
struct Reader<'r, 'a> {
    strings: &'r Strings<'a>,
    blob: &'r Blob<'a>,
    header: &'r TablesHeader<'a>,
}

impl<'r, 'a> Reader<'r, 'a> {
    fn new(strings: &'r Strings<'a>, blob: &'r Blob<'a>, header: &'r TablesHeader<'a>) -> Self {
        Reader {
            strings,
            blob,
            header,
        }
    }

    fn string(&self, index: u32) -> Result<String> {
        Ok(self.strings.get(index as usize)?.to_string())
    }

    fn optional_string(&self, index: u32) -> Result<Option<String>> {
        let value = self.strings.get(index as usize)?;
        Ok((!value.is_empty()).then(|| value.to_string()))
    }

    fn module_name(&self) -> String {
        self.header
            .table::<ModuleRaw>(TableId::Module)
            .and_then(|table| table.get(1))
            .and_then(|row| self.string(row.name).ok())
            .unwrap_or_default()
    }

    fn identity(&self, module_name: &str) -> Result<AssemblyIdentity> {
        let Some(row) = self
            .header
            .table::<AssemblyRaw>(TableId::Assembly)
            .and_then(|table| table.get(1))
        else {
            // A module without a manifest is known by its file name
            let name = module_name
                .rsplit_once('.')
                .map_or(module_name, |(stem, _)| stem);
            return Ok(AssemblyIdentity::new(name, AssemblyVersion::default()));
        };

        let public_key = self.blob.get(row.public_key as usize)?;
        Ok(AssemblyIdentity {
            name: self.string(row.name)?,
            version: version(row.version),
            culture: self.optional_string(row.culture)?,
            public_key_token: (!public_key.is_empty()).then(|| public_key_token(public_key)),
        })
    }

    fn references(&self) -> Vec<AssemblyIdentity> {
        let Some(table) = self.header.table::<AssemblyRefRaw>(TableId::AssemblyRef) else {
            return Vec::new();
        };

        table
            .iter()
            .filter_map(|row| match self.reference(&row) {
                Ok(identity) => Some(identity),
                Err(error) => {
                    warn!(rid = row.rid, %error, "skipping unreadable assembly reference");
                    None
                }
            })
            .collect()
    }

    fn reference(&self, row: &AssemblyRefRaw) -> Result<AssemblyIdentity> {
        let key = self.blob.get(row.public_key_or_token as usize)?;
        let public_key_token = if key.is_empty() {
            None
        } else if row.flags & ASSEMBLY_REF_FULL_KEY != 0 {
            Some(public_key_token(key))
        } else {
            <[u8; 8]>::try_from(key).ok()
        };

        Ok(AssemblyIdentity {
            name: self.string(row.name)?,
            version: version(row.version),
            culture: self.optional_string(row.culture)?,
            public_key_token,
        })
    }

    fn attributes(&self, references: &[AssemblyIdentity]) -> AssemblyAttributes {
        let mut attributes = AssemblyAttributes::default();
        let Some(table) = self
            .header
            .table::<CustomAttributeRaw>(TableId::CustomAttribute)
        else {
            return attributes;
        };

        for row in table.iter() {
            if row.parent.tag != TableId::Assembly {
                continue;
            }

            let Some(attribute_type) = self.attribute_type_name(&row.constructor, references)
            else {
                continue;
            };

            match self
                .blob
                .get(row.value as usize)
                .and_then(parse_string_attribute)
            {
                Ok(Some(value)) => attributes.set(&attribute_type, value),
                Ok(None) => {}
                Err(error) => debug!(attribute = %attribute_type, %error, "unreadable attribute value"),
            }
        }

        attributes
    }

    fn attribute_type_name(
        &self,
        constructor: &CodedIndex,
        references: &[AssemblyIdentity],
    ) -> Option<String> {
        let declaring = match constructor.tag {
            TableId::MemberRef => {
                let member = self
                    .header
                    .table::<MemberRefRaw>(TableId::MemberRef)?
                    .get(constructor.row)?;
                member.class
            }
            TableId::MethodDef => {
                CodedIndex::new(TableId::TypeDef, self.method_owner(constructor.row)?)
            }
            _ => return None,
        };

        match declaring.tag {
            TableId::TypeRef => self
                .external_type(declaring.row, references, 0)
                .ok()
                .and_then(|external| external.path.last().cloned()),
            TableId::TypeDef => {
                let row = self
                    .header
                    .table::<TypeDefRaw>(TableId::TypeDef)?
                    .get(declaring.row)?;
                self.string(row.type_name).ok()
            }
            _ => None,
        }
    }

    /// The `TypeDef` row owning the method with row `method`.
    fn method_owner(&self, method: u32) -> Option<u32> {
        let table = self.header.table::<TypeDefRaw>(TableId::TypeDef)?;
        table
            .iter()
            .filter(|row| row.method_list != 0 && row.method_list <= method)
            .last()
            .map(|row| row.rid)
    }

    fn external_type(
        &self,
        rid: u32,
        references: &[AssemblyIdentity],
        depth: usize,
    ) -> Result<ExternalType> {
        if depth > MAX_NESTING_DEPTH {
            return Err(RecursionLimit(MAX_NESTING_DEPTH));
        }

        let row = self
            .header
            .table::<TypeRefRaw>(TableId::TypeRef)
            .ok_or(OutOfBounds)?
            .try_get(rid)?;
        let name = self.string(row.type_name)?;
        let scope = &row.resolution_scope;

        match scope.tag {
            TableId::TypeRef if !scope.is_null() => {
                let mut outer = self.external_type(scope.row, references, depth + 1)?;
                outer.path.push(name);
                Ok(outer)
            }
            TableId::AssemblyRef if !scope.is_null() => {
                let reference = references
                    .get(scope.row as usize - 1)
                    .ok_or_else(|| malformed_error!("Invalid assembly reference - {}", scope.row))?;
                Ok(ExternalType {
                    scope: TypeScope::Assembly(reference.name.clone()),
                    namespace: self.string(row.type_namespace)?,
                    path: vec![name],
                })
            }
            _ => Ok(ExternalType {
                scope: TypeScope::CurrentModule,
                namespace: self.string(row.type_namespace)?,
                path: vec![name],
            }),
        }
    }

    /// Resolve a `TypeDefOrRef` coded index into a [`TypeReference`].
    fn type_reference(
        &self,
        index: &CodedIndex,
        references: &[AssemblyIdentity],
        local_names: &HashMap<String, Token>,
        depth: usize,
    ) -> Result<TypeReference> {
        if depth > MAX_NESTING_DEPTH {
            return Err(RecursionLimit(MAX_NESTING_DEPTH));
        }

        match index.tag {
            TableId::TypeDef => Ok(TypeReference::local(index.token)),
            TableId::TypeRef => {
                let external = self.external_type(index.row, references, 0)?;
                if external.scope == TypeScope::CurrentModule {
                    if let Some(token) = local_names.get(&external.full_name()) {
                        return Ok(TypeReference::local(*token));
                    }
                }
                Ok(TypeReference::external(external))
            }
            TableId::TypeSpec => {
                let row = self
                    .header
                    .table::<TypeSpecRaw>(TableId::TypeSpec)
                    .ok_or(OutOfBounds)?
                    .try_get(index.row)?;
                let instance = parse_generic_instance(self.blob.get(row.signature as usize)?)?;
                if instance.definition.tag == TableId::TypeSpec {
                    return Err(NotSupported);
                }

                let mut reference =
                    self.type_reference(&instance.definition, references, local_names, depth + 1)?;
                reference.generic_instance = true;
                Ok(reference)
            }
            _ => Err(NotSupported),
        }
    }

    fn types(&self, references: &[AssemblyIdentity]) -> (Vec<Option<Arc<TypeDef>>>, usize) {
        let Some(table) = self.header.table::<TypeDefRaw>(TableId::TypeDef) else {
            return (Vec::new(), 0);
        };
        let count = table.row_count() as usize;

        let mut enclosing: Vec<Option<u32>> = vec![None; count + 1];
        let mut nested: Vec<Vec<Token>> = vec![Vec::new(); count + 1];
        if let Some(nested_table) = self.header.table::<NestedClassRaw>(TableId::NestedClass) {
            for row in nested_table.iter() {
                let (child, parent) = (row.nested_class as usize, row.enclosing_class as usize);
                if child == 0 || child > count || parent == 0 || parent > count {
                    continue;
                }
                enclosing[child] = Some(row.enclosing_class);
                nested[parent].push(TableId::TypeDef.token(row.nested_class));
            }
        }

        let mut generic_params: Vec<Vec<(u16, String)>> = vec![Vec::new(); count + 1];
        if let Some(params) = self.header.table::<GenericParamRaw>(TableId::GenericParam) {
            for row in params.iter() {
                let owner = row.owner.row as usize;
                if row.owner.tag != TableId::TypeDef || owner == 0 || owner > count {
                    continue;
                }
                if let Ok(name) = self.string(row.name) {
                    generic_params[owner].push((row.number, name));
                }
            }
        }

        let mut interfaces: Vec<Vec<CodedIndex>> = vec![Vec::new(); count + 1];
        if let Some(impls) = self.header.table::<InterfaceImplRaw>(TableId::InterfaceImpl) {
            for row in impls.iter() {
                let class = row.class as usize;
                if class != 0 && class <= count {
                    interfaces[class].push(row.interface);
                }
            }
        }

        let rows: Vec<Option<TypeDefRaw>> = (1..=table.row_count())
            .map(|rid| match table.try_get(rid) {
                Ok(row) => Some(row),
                Err(error) => {
                    warn!(rid, %error, "skipping unreadable type definition");
                    None
                }
            })
            .collect();

        // Names first, so references to local types can be resolved by full name
        let mut names: Vec<Option<(String, String, String)>> = vec![None; count + 1];
        for row in rows.iter().flatten() {
            match self.names(row, &rows, &enclosing) {
                Ok(resolved) => names[row.rid as usize] = Some(resolved),
                Err(error) => warn!(rid = row.rid, %error, "skipping type with unreadable name"),
            }
        }

        let local_names: HashMap<String, Token> = names
            .iter()
            .enumerate()
            .filter_map(|(rid, entry)| {
                entry
                    .as_ref()
                    .map(|(_, _, full)| (full.clone(), TableId::TypeDef.token(rid as u32)))
            })
            .collect();

        let mut failed = 0;
        let mut types = Vec::with_capacity(count);
        for rid in 1..=count {
            let (Some(row), Some((namespace, name, full))) = (&rows[rid - 1], names[rid].take())
            else {
                failed += 1;
                types.push(None);
                continue;
            };

            let extends = if row.extends.is_null() {
                None
            } else {
                match self.type_reference(&row.extends, references, &local_names, 0) {
                    Ok(reference) => Some(reference),
                    Err(error) => {
                        debug!(type_name = %full, %error, "base type not representable");
                        None
                    }
                }
            };

            let resolved_interfaces = interfaces[rid]
                .iter()
                .filter_map(
                    |index| match self.type_reference(index, references, &local_names, 0) {
                        Ok(reference) => Some(reference),
                        Err(error) => {
                            debug!(type_name = %full, %error, "interface not representable");
                            None
                        }
                    },
                )
                .collect();

            let mut params = std::mem::take(&mut generic_params[rid]);
            params.sort_by_key(|(number, _)| *number);

            types.push(Some(Arc::new(TypeDef {
                token: TableId::TypeDef.token(rid as u32),
                namespace,
                name,
                full_name: full,
                flags: TypeAttributes::from_bits_retain(row.flags),
                extends,
                interfaces: resolved_interfaces,
                generic_params: params.into_iter().map(|(_, name)| name).collect(),
                enclosing: enclosing[rid].map(|parent| TableId::TypeDef.token(parent)),
                nested: std::mem::take(&mut nested[rid]),
            })));
        }

        if failed > 0 {
            warn!(failed, total = count, "some types failed to materialise");
        }

        (types, failed)
    }

    /// Namespace, simple name and full name of a type, following its nesting chain.
    fn names(
        &self,
        row: &TypeDefRaw,
        rows: &[Option<TypeDefRaw>],
        enclosing: &[Option<u32>],
    ) -> Result<(String, String, String)> {
        let name = self.string(row.type_name)?;
        let mut path = vec![name.clone()];
        let mut outermost = row;

        let mut current = enclosing[row.rid as usize];
        while let Some(parent) = current {
            if path.len() > MAX_NESTING_DEPTH {
                return Err(RecursionLimit(MAX_NESTING_DEPTH));
            }

            let Some(parent_row) = rows.get(parent as usize - 1).and_then(Option::as_ref) else {
                return Err(Error::Error(format!("Missing enclosing type - {}", parent)));
            };

            path.push(self.string(parent_row.type_name)?);
            outermost = parent_row;
            current = enclosing[parent as usize];
        }
        path.reverse();

        let namespace = self.string(outermost.type_namespace)?;
        let full = full_name(&namespace, &path);
        Ok((namespace, name, full))
    }
}

fn version(parts: [u16; 4]) -> AssemblyVersion {
    AssemblyVersion::new(parts[0], parts[1], parts[2], parts[3])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        image::ModuleImage,
        metadata::typedef::TypeTarget,
        test::builder::{ImageBuilder, TypeBuilder, TypeHandle},
    };

    fn read(builder: &ImageBuilder) -> ModuleMetadata {
        let data = builder.build();
        let image = ModuleImage::parse(&data).unwrap();
        ModuleMetadata::read(&data, &image).unwrap()
    }

    #[test]
    fn identity_and_references() {
        let mut builder = ImageBuilder::new("Plugins");
        builder.version(2, 1, 0, 7);
        builder.public_key(&[0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0]);
        builder.assembly_ref("Contracts", [1, 0, 0, 0]);
        builder.assembly_ref_with_token("mscorlib", [4, 0, 0, 0], [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89]);

        let metadata = read(&builder);
        assert_eq!(metadata.identity.name, "Plugins");
        assert_eq!(metadata.identity.version, AssemblyVersion::new(2, 1, 0, 7));
        assert_eq!(metadata.identity.token_hex().as_deref(), Some("b77a5c561934e089"));
        assert_eq!(metadata.module_name, "Plugins.dll");
        assert_eq!(metadata.runtime_version, "v4.0.30319");

        assert_eq!(metadata.references.len(), 2);
        assert!(metadata.references_assembly("contracts"));
        assert_eq!(
            metadata.references[1].display_name(),
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );
        assert!(!metadata.references_assembly("System.Core"));
    }

    #[test]
    fn types_and_relations() {
        let mut builder = ImageBuilder::new("Plugins");
        let contracts = builder.assembly_ref("Contracts", [1, 0, 0, 0]);
        let iplugin = builder.type_ref(contracts, "Contracts", "IPlugin");
        let base = builder.add_type(TypeBuilder::class("Plugins", "PluginBase").abstract_type());
        let worker = builder.add_type(
            TypeBuilder::class("Plugins", "Worker")
                .extends(base)
                .implements(iplugin),
        );
        let inner = builder.add_type(TypeBuilder::class("", "Inner").nested_in(worker));
        let generic = builder.add_type(TypeBuilder::class("Plugins", "Handler`1").generic(&["T"]));
        let closed = builder.generic_instance(generic, 1);
        builder.add_type(TypeBuilder::class("Plugins", "IntHandler").extends(closed));

        let metadata = read(&builder);
        assert_eq!(metadata.failed_types(), 0);

        let names: Vec<&str> = metadata.types().map(|t| t.full_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Plugins.PluginBase",
                "Plugins.Worker",
                "Plugins.Worker+Inner",
                "Plugins.Handler`1",
                "Plugins.IntHandler"
            ]
        );
        assert_eq!(metadata.top_level_types().count(), 4);

        let worker_def = metadata.find_type("plugins.worker", true).unwrap();
        assert!(metadata.find_type("plugins.worker", false).is_none());
        assert_eq!(worker_def.extends, Some(TypeReference::local(base.token())));
        assert_eq!(worker_def.nested, vec![inner.token()]);
        assert_eq!(worker_def.interfaces.len(), 1);
        let external = worker_def.interfaces[0].as_external().unwrap();
        assert_eq!(external.scope, TypeScope::Assembly("Contracts".to_string()));
        assert_eq!(external.full_name(), "Contracts.IPlugin");

        let inner_def = metadata.type_def(inner.token()).unwrap();
        assert_eq!(inner_def.enclosing, Some(worker.token()));
        assert_eq!(inner_def.namespace, "Plugins");

        let generic_def = metadata.find_type("Plugins.Handler`1", false).unwrap();
        assert_eq!(generic_def.generic_params, vec!["T".to_string()]);
        assert!(!generic_def.is_concrete());

        let int_handler = metadata.find_type("Plugins.IntHandler", false).unwrap();
        let extends = int_handler.extends.as_ref().unwrap();
        assert!(extends.generic_instance);
        assert_eq!(extends.target, TypeTarget::Local(generic.token()));
    }

    #[test]
    fn module_scoped_reference_resolves_locally() {
        let mut builder = ImageBuilder::new("Plugins");
        let target = builder.add_type(TypeBuilder::interface("Plugins", "ILocal"));
        let by_name = builder.type_ref_in_module("Plugins", "ILocal");
        builder.add_type(TypeBuilder::class("Plugins", "Impl").implements(by_name));

        let metadata = read(&builder);
        let implementation = metadata.find_type("Plugins.Impl", false).unwrap();
        assert_eq!(implementation.interfaces, vec![TypeReference::local(target.token())]);
    }

    #[test]
    fn nested_type_reference() {
        let mut builder = ImageBuilder::new("Plugins");
        let contracts = builder.assembly_ref("Contracts", [1, 0, 0, 0]);
        let outer = builder.type_ref(contracts, "Contracts", "Host");
        let inner = builder.nested_type_ref(outer, "IExtension");
        builder.add_type(TypeBuilder::class("Plugins", "Extension").implements(inner));

        let metadata = read(&builder);
        let extension = metadata.find_type("Plugins.Extension", false).unwrap();
        let external = extension.interfaces[0].as_external().unwrap();
        assert_eq!(external.path, vec!["Host".to_string(), "IExtension".to_string()]);
        assert_eq!(external.full_name(), "Contracts.Host+IExtension");
    }

    #[test]
    fn assembly_attributes() {
        let mut builder = ImageBuilder::new("Plugins");
        builder.attribute("AssemblyTitleAttribute", "Plugin Pack");
        builder.attribute("AssemblyCompanyAttribute", "Contoso");
        builder.attribute("AssemblyDescriptionAttribute", "Sample plugins");
        builder.attribute("AssemblyInformationalVersionAttribute", "2.1.0-beta");
        builder.attribute("ComVisibleAttribute", "ignored");

        let metadata = read(&builder);
        assert_eq!(metadata.attributes.title.as_deref(), Some("Plugin Pack"));
        assert_eq!(metadata.attributes.company.as_deref(), Some("Contoso"));
        assert_eq!(metadata.attributes.description.as_deref(), Some("Sample plugins"));
        assert_eq!(metadata.attributes.informational_version.as_deref(), Some("2.1.0-beta"));
        assert_eq!(metadata.attributes.product, None);
    }

    #[test]
    fn broken_nesting_degrades() {
        let mut builder = ImageBuilder::new("Plugins");
        let a = builder.add_type(TypeBuilder::class("Plugins", "A"));
        let b = builder.add_type(TypeBuilder::class("", "B").nested_in(a));
        builder.add_type(TypeBuilder::class("Plugins", "C"));
        // A cycle: A nested in B nested in A
        builder.raw_nesting(a, b);

        let metadata = read(&builder);
        assert_eq!(metadata.failed_types(), 2);
        let names: Vec<&str> = metadata.types().map(|t| t.full_name.as_str()).collect();
        assert_eq!(names, vec!["Plugins.C"]);
    }

    #[test]
    fn image_without_metadata() {
        let data = ImageBuilder::new("Native").native().build();
        let image = ModuleImage::parse(&data).unwrap();
        assert!(matches!(
            ModuleMetadata::read(&data, &image),
            Err(NotSupported)
        ));
    }

    #[test]
    fn type_handles() {
        assert_eq!(TypeHandle::Def(2).token(), Token::new(0x0200_0002));
    }
}
