//! In-memory catalog and cell reader built from a [`CubeSchema`]

use indexmap::IndexSet;
use log::debug;
use olapcalc_ast::Identifier;
use olapcalc_types::{
    DimensionId, HierarchyId, LevelId, Member, MemberId, MemberKind, MemberSpec, Value,
};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::catalog::{
    CalculatedFormula, Catalog, DimensionInfo, Element, HierarchyInfo, LevelInfo, ModelError,
    ModelResult,
};
use crate::reader::{CellReader, CellValue};
use crate::schema::{CubeSchema, MemberSchema};

const MEASURES: &str = "Measures";

/// Lookup key: hierarchy, parent (None for top-level) and lower-cased name
type PathKey = (HierarchyId, Option<MemberId>, String);

/// Catalog holding the whole member tree in memory
#[derive(Debug)]
pub struct InMemoryCatalog {
    name: String,
    dimensions: Vec<DimensionInfo>,
    hierarchies: Vec<HierarchyInfo>,
    levels: Vec<LevelInfo>,
    members: Vec<Member>,
    children: HashMap<MemberId, Vec<Member>>,
    level_members: HashMap<LevelId, Vec<Member>>,
    roots: Vec<Vec<Member>>,
    all_members: Vec<Option<Member>>,
    by_path: HashMap<PathKey, Member>,
    by_name: HashMap<(HierarchyId, String), Member>,
    measures: Vec<Member>,
    formulas: HashMap<MemberId, CalculatedFormula>,
}

struct Builder {
    catalog: InMemoryCatalog,
    ordinal: u32,
}

impl Builder {
    fn next_id(&self) -> MemberId {
        MemberId(self.catalog.members.len() as u32)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_member(
        &mut self,
        name: &str,
        unique_name: String,
        kind: MemberKind,
        calculated: bool,
        hierarchy: &HierarchyInfo,
        depth: u32,
        parent: Option<&Member>,
        solve_order: i32,
    ) -> ModelResult<Member> {
        let level = *hierarchy.levels.get(depth as usize).ok_or_else(|| {
            ModelError::InvalidSchema(format!(
                "Member {unique_name} is deeper than the levels of {}",
                hierarchy.unique_name
            ))
        })?;
        let member = Member::new(MemberSpec {
            id: self.next_id(),
            name: name.to_string(),
            unique_name,
            kind,
            calculated,
            hierarchy: hierarchy.id,
            dimension: hierarchy.dimension,
            level,
            depth,
            ordinal: self.ordinal,
            parent: parent.cloned(),
            solve_order,
            visible: true,
        });
        self.ordinal += 1;

        let key = (hierarchy.id, parent.map(Member::id), name.to_lowercase());
        if self.catalog.by_path.insert(key, member.clone()).is_some() {
            return Err(ModelError::InvalidSchema(format!(
                "Duplicate member {}",
                member.unique_name()
            )));
        }
        self.catalog
            .by_name
            .entry((hierarchy.id, name.to_lowercase()))
            .or_insert_with(|| member.clone());
        self.catalog.members.push(member.clone());

        if !calculated {
            self.catalog
                .level_members
                .entry(level)
                .or_default()
                .push(member.clone());
            match parent {
                Some(p) => self
                    .catalog
                    .children
                    .entry(p.id())
                    .or_default()
                    .push(member.clone()),
                None => self.catalog.roots[hierarchy.id.index()].push(member.clone()),
            }
        }
        Ok(member)
    }

    fn add_tree(
        &mut self,
        schema: &MemberSchema,
        hierarchy: &HierarchyInfo,
        depth: u32,
        parent: Option<&Member>,
        path: &str,
    ) -> ModelResult<()> {
        let unique_name = format!("{path}.[{}]", schema.name);
        let member = self.add_member(
            &schema.name,
            unique_name.clone(),
            MemberKind::Regular,
            false,
            hierarchy,
            depth,
            parent,
            0,
        )?;
        for child in &schema.children {
            self.add_tree(child, hierarchy, depth + 1, Some(&member), &unique_name)?;
        }
        Ok(())
    }

    fn add_hierarchy(
        &mut self,
        name: &str,
        dimension: DimensionId,
        level_names: Vec<String>,
        is_measures: bool,
    ) -> ModelResult<HierarchyInfo> {
        if self.catalog.find_hierarchy(name).is_some() {
            return Err(ModelError::InvalidSchema(format!("Duplicate hierarchy {name}")));
        }
        let id = HierarchyId(self.catalog.hierarchies.len() as u32);
        let unique_name = format!("[{name}]");
        let levels = level_names
            .into_iter()
            .enumerate()
            .map(|(depth, level)| {
                let info = LevelInfo {
                    id: LevelId(self.catalog.levels.len() as u32),
                    unique_name: format!("{unique_name}.[{level}]"),
                    name: level,
                    hierarchy: id,
                    depth: depth as u32,
                };
                let level_id = info.id;
                self.catalog.levels.push(info);
                level_id
            })
            .collect();
        let info = HierarchyInfo {
            id,
            name: name.to_string(),
            unique_name,
            dimension,
            levels,
            is_measures,
        };
        self.catalog.hierarchies.push(info.clone());
        self.catalog.roots.push(Vec::new());
        self.catalog.all_members.push(None);
        self.ordinal = 0;
        Ok(info)
    }
}

impl InMemoryCatalog {
    /// Build the catalog of `schema`. The measures dimension is always
    /// dimension 0 with hierarchy 0.
    pub fn from_schema(schema: &CubeSchema) -> ModelResult<Self> {
        let mut b = Builder {
            catalog: InMemoryCatalog {
                name: schema.name.clone(),
                dimensions: Vec::new(),
                hierarchies: Vec::new(),
                levels: Vec::new(),
                members: Vec::new(),
                children: HashMap::new(),
                level_members: HashMap::new(),
                roots: Vec::new(),
                all_members: Vec::new(),
                by_path: HashMap::new(),
                by_name: HashMap::new(),
                measures: Vec::new(),
                formulas: HashMap::new(),
            },
            ordinal: 0,
        };

        let measures = b.add_hierarchy(
            MEASURES,
            DimensionId(0),
            vec!["MeasuresLevel".to_string()],
            true,
        )?;
        b.catalog.dimensions.push(DimensionInfo {
            id: DimensionId(0),
            name: MEASURES.to_string(),
            hierarchies: vec![measures.id],
        });
        for m in &schema.measures {
            let member = b.add_member(
                &m.name,
                format!("[{MEASURES}].[{}]", m.name),
                MemberKind::Measure,
                false,
                &measures,
                0,
                None,
                0,
            )?;
            b.catalog.measures.push(member);
        }

        for dim in &schema.dimensions {
            let dim_id = DimensionId(b.catalog.dimensions.len() as u32);
            let mut hierarchy_ids = Vec::new();
            for h in &dim.hierarchies {
                let name = h.name_or(&dim.name);
                let mut level_names = Vec::new();
                if h.has_all {
                    level_names.push("(All)".to_string());
                }
                level_names.extend(h.levels.iter().cloned());
                let info = b.add_hierarchy(name, dim_id, level_names, false)?;
                let top_depth = u32::from(h.has_all);
                let all = if h.has_all {
                    let all = b.add_member(
                        &h.all_member_name,
                        format!("{}.[{}]", info.unique_name, h.all_member_name),
                        MemberKind::All,
                        false,
                        &info,
                        0,
                        None,
                        0,
                    )?;
                    b.catalog.all_members[info.id.index()] = Some(all.clone());
                    Some(all)
                } else {
                    None
                };
                for m in &h.members {
                    b.add_tree(m, &info, top_depth, all.as_ref(), &info.unique_name)?;
                }
                hierarchy_ids.push(info.id);
            }
            b.catalog.dimensions.push(DimensionInfo {
                id: dim_id,
                name: dim.name.clone(),
                hierarchies: hierarchy_ids,
            });
        }

        for calc in &schema.calculated_members {
            let hierarchy = match &calc.hierarchy {
                None => measures.clone(),
                Some(name) => b
                    .catalog
                    .find_hierarchy(name)
                    .and_then(|id| b.catalog.hierarchy(id))
                    .cloned()
                    .ok_or_else(|| ModelError::InvalidSchema(format!("Unknown hierarchy {name}")))?,
            };
            let parent = match &calc.parent {
                None => None,
                Some(p) => {
                    let id = Identifier::parse(p)
                        .map_err(|e| ModelError::InvalidSchema(e.to_string()))?;
                    match b.catalog.lookup(&id.segments) {
                        Some(Element::Member(m)) if m.hierarchy() == hierarchy.id => Some(m),
                        _ => return Err(ModelError::MemberNotFound(p.clone())),
                    }
                }
            };
            let depth = match &parent {
                Some(p) => p.depth() + 1,
                None if hierarchy.is_measures => 0,
                None => u32::from(b.catalog.all_members[hierarchy.id.index()].is_some()),
            };
            let path = parent
                .as_ref()
                .map_or_else(|| hierarchy.unique_name.clone(), |p| p.unique_name().to_string());
            let kind = if hierarchy.is_measures {
                MemberKind::Measure
            } else {
                MemberKind::Regular
            };
            // Calculated members sort after every stored member
            b.ordinal = b.catalog.members.len() as u32 + 1_000_000;
            let member = b.add_member(
                &calc.name,
                format!("{path}.[{}]", calc.name),
                kind,
                true,
                &hierarchy,
                depth,
                parent.as_ref(),
                calc.solve_order,
            )?;
            if hierarchy.is_measures {
                b.catalog.measures.push(member.clone());
            }
            b.catalog.formulas.insert(
                member.id(),
                CalculatedFormula {
                    member,
                    formula: calc.formula.clone(),
                },
            );
        }

        debug!(
            "Built catalog for cube {} with {} hierarchies and {} members",
            schema.name,
            b.catalog.hierarchies.len(),
            b.catalog.members.len()
        );
        Ok(b.catalog)
    }

    fn find_hierarchy(&self, name: &str) -> Option<HierarchyId> {
        self.hierarchies
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.id)
    }

    fn find_dimension(&self, name: &str) -> Option<&DimensionInfo> {
        self.dimensions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    /// Member by id
    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(id.0 as usize)
    }

    /// Resolve a unique name such as `[Product].[Drink]` to a member
    pub fn member_by_name(&self, unique_name: &str) -> ModelResult<Member> {
        let id = Identifier::parse(unique_name)
            .map_err(|_| ModelError::MemberNotFound(unique_name.to_string()))?;
        match self.lookup(&id.segments) {
            Some(Element::Member(m)) => Ok(m),
            _ => Err(ModelError::MemberNotFound(unique_name.to_string())),
        }
    }

    fn lookup_member(&self, hierarchy: HierarchyId, path: &[String]) -> Option<Member> {
        let mut current: Option<Member> = None;
        for (i, segment) in path.iter().enumerate() {
            let name = segment.to_lowercase();
            let parent = current.as_ref().map(Member::id);
            let found = self
                .by_path
                .get(&(hierarchy, parent, name.clone()))
                .or_else(|| match (i, &self.all_members[hierarchy.index()]) {
                    // `[Product].[Drink]` skips the All member
                    (0, Some(all)) => self.by_path.get(&(hierarchy, Some(all.id()), name.clone())),
                    _ => None,
                })
                .or_else(|| match i {
                    0 => self.by_name.get(&(hierarchy, name.clone())),
                    _ => None,
                });
            current = Some(found?.clone());
        }
        current
    }
}

impl Catalog for InMemoryCatalog {
    fn cube_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> &[DimensionInfo] {
        &self.dimensions
    }

    fn hierarchies(&self) -> &[HierarchyInfo] {
        &self.hierarchies
    }

    fn level(&self, id: LevelId) -> Option<&LevelInfo> {
        self.levels.get(id.0 as usize)
    }

    fn measures_hierarchy(&self) -> HierarchyId {
        HierarchyId(0)
    }

    fn lookup(&self, segments: &[String]) -> Option<Element> {
        let (first, rest) = segments.split_first()?;
        let hierarchy = match self.find_hierarchy(first) {
            Some(h) => h,
            None => {
                let dim = self.find_dimension(first)?;
                match (rest.is_empty(), dim.hierarchies.as_slice()) {
                    (true, _) => return Some(Element::Dimension(dim.id)),
                    (false, [only]) => *only,
                    _ => return None,
                }
            }
        };
        if rest.is_empty() {
            return Some(Element::Hierarchy(hierarchy));
        }
        if let [level_name] = rest {
            let info = self.hierarchy(hierarchy)?;
            if let Some(level) = info
                .levels
                .iter()
                .filter_map(|l| self.level(*l))
                .find(|l| l.name.eq_ignore_ascii_case(level_name))
            {
                return Some(Element::Level(level.id));
            }
        }
        self.lookup_member(hierarchy, rest).map(Element::Member)
    }

    fn children(&self, member: &Member) -> Vec<Member> {
        self.children.get(&member.id()).cloned().unwrap_or_default()
    }

    fn level_members(&self, level: LevelId) -> Vec<Member> {
        self.level_members.get(&level).cloned().unwrap_or_default()
    }

    fn root_members(&self, hierarchy: HierarchyId) -> Vec<Member> {
        self.roots.get(hierarchy.index()).cloned().unwrap_or_default()
    }

    fn all_member(&self, hierarchy: HierarchyId) -> Option<Member> {
        self.all_members.get(hierarchy.index()).cloned().flatten()
    }

    fn measures(&self) -> Vec<Member> {
        self.measures.clone()
    }

    fn formula(&self, member: &Member) -> Option<&CalculatedFormula> {
        self.formulas.get(&member.id())
    }
}

struct Fact {
    /// One leaf member per hierarchy; unused for the measures hierarchy
    members: Vec<Option<Member>>,
    values: HashMap<MemberId, Decimal>,
}

/// Cell reader summing fact rows.
///
/// A coordinate member covers a fact member when it is that member or one
/// of its ancestors, so All members aggregate every row. In batch mode,
/// coordinates that have not been loaded answer [`CellValue::NotReady`]
/// and are queued for [`InMemoryCellReader::load_pending`].
pub struct InMemoryCellReader {
    measures_hierarchy: HierarchyId,
    facts: Vec<Fact>,
    batch: AtomicBool,
    loaded: RwLock<HashSet<Vec<MemberId>>>,
    pending: Mutex<IndexSet<Vec<MemberId>>>,
    misses: AtomicUsize,
    reads: AtomicUsize,
}

impl InMemoryCellReader {
    pub fn from_schema(schema: &CubeSchema, catalog: &InMemoryCatalog) -> ModelResult<Self> {
        let measures_hierarchy = catalog.measures_hierarchy();
        let mut facts = Vec::with_capacity(schema.facts.len());
        for (row_index, row) in schema.facts.iter().enumerate() {
            let mut members: Vec<Option<Member>> = vec![None; catalog.hierarchies().len()];
            for (hierarchy_name, member_name) in &row.coordinates {
                let hierarchy = catalog.find_hierarchy(hierarchy_name).ok_or_else(|| {
                    ModelError::InvalidSchema(format!(
                        "Fact {row_index} refers to unknown hierarchy {hierarchy_name}"
                    ))
                })?;
                let path = Identifier::parse(member_name)
                    .map_err(|e| ModelError::InvalidSchema(e.to_string()))?;
                let member = catalog
                    .lookup_member(hierarchy, &path.segments)
                    .ok_or_else(|| ModelError::MemberNotFound(member_name.clone()))?;
                members[hierarchy.index()] = Some(member);
            }
            for info in catalog.hierarchies() {
                if info.is_measures || members[info.id.index()].is_some() {
                    continue;
                }
                match catalog.all_member(info.id) {
                    Some(all) => members[info.id.index()] = Some(all),
                    None => {
                        return Err(ModelError::InvalidSchema(format!(
                            "Fact {row_index} has no member for {}",
                            info.unique_name
                        )));
                    }
                }
            }
            let mut values = HashMap::new();
            for (measure, value) in &row.measures {
                let member = catalog
                    .lookup_member(measures_hierarchy, std::slice::from_ref(measure))
                    .filter(|m| !m.is_calculated())
                    .ok_or_else(|| ModelError::MemberNotFound(format!("[Measures].[{measure}]")))?;
                values.insert(member.id(), *value);
            }
            facts.push(Fact { members, values });
        }
        Ok(Self {
            measures_hierarchy,
            facts,
            batch: AtomicBool::new(false),
            loaded: RwLock::new(HashSet::new()),
            pending: Mutex::new(IndexSet::new()),
            misses: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        })
    }

    /// Enter or leave batch-collection mode
    pub fn set_batch_mode(&self, batch: bool) {
        self.batch.store(batch, Ordering::SeqCst);
    }

    pub fn is_batch_mode(&self) -> bool {
        self.batch.load(Ordering::SeqCst)
    }

    /// Mark every queued coordinate as loaded; returns how many were queued
    pub fn load_pending(&self) -> usize {
        let pending: Vec<_> = self.pending.lock().drain(..).collect();
        let count = pending.len();
        self.loaded.write().extend(pending);
        debug!("Loaded {count} pending cells");
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of reads, including those answered `NotReady`
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn covers(coordinate: &Member, fact: &Member) -> bool {
        coordinate == fact || coordinate.is_ancestor_of(fact)
    }

    fn aggregate(&self, coordinates: &[Member]) -> Value {
        let Some(measure) = coordinates.get(self.measures_hierarchy.index()) else {
            return Value::Null;
        };
        let mut sum: Option<Decimal> = None;
        for fact in &self.facts {
            let Some(value) = fact.values.get(&measure.id()) else {
                continue;
            };
            let matches = fact.members.iter().zip(coordinates).all(|(f, c)| match f {
                Some(f) => Self::covers(c, f),
                None => true,
            });
            if matches {
                sum = Some(sum.unwrap_or_default() + value);
            }
        }
        sum.map_or(Value::Null, Value::Numeric)
    }
}

impl CellReader for InMemoryCellReader {
    fn get(&self, coordinates: &[Member]) -> CellValue {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if self.is_batch_mode() {
            let key: Vec<MemberId> = coordinates.iter().map(Member::id).collect();
            if !self.loaded.read().contains(&key) {
                self.pending.lock().insert(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return CellValue::NotReady;
            }
        }
        CellValue::Value(self.aggregate(coordinates))
    }

    fn miss_count(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}
