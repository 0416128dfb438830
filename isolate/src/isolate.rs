use std::{
    sync::Arc,
    thread::{self, ThreadId},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    ApiState, ClassTable, CodecError, Counters, Debugger, Failure, Frame,
    Function, HandleVisitor, Heap, HeapCreateInfo, Inbox, InterruptKind,
    InterruptWord, IsolateId, MegamorphicCacheTable, Message, MessageCodec,
    MessageHandler, ObjectPointerVisitor, ObjectStore, Outcome, PortId,
    PortMap, PortRegistry, Priority, SnapshotCodec, Stack, StubCode, Value,
    Visitable, ZoneHandle, Zones, callbacks, current_stack_pointer,
    print_invoked_functions, scope,
};

/// Headroom kept below the computed stack limit for runtime work.
pub const STACK_SIZE_BUFFER: usize = 16 * 1024;
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_NAME_PREFIX: &str = "isolate";
/// Isolates with this prefix are not traced.
pub const VM_ISOLATE_PREFIX: &str = "vm-isolate";

#[derive(Debug, Clone, Default)]
pub struct IsolateFlags {
    /// Log isolate creation and shutdown.
    pub trace_isolates: bool,
    /// Log invoked functions by count at shutdown.
    pub report_usage_count: bool,
    /// Program function consulted for unhandled exceptions.
    pub unhandled_exception_handler: Option<String>,
    /// Log counters after every this many handled messages. 0 disables.
    pub report_counters_every: u64,
}

pub struct IsolateCreateInfo {
    pub name_prefix: Option<String>,
    /// Bytes of stack the isolate may use below the point it is entered.
    pub stack_size: usize,
    pub heap: HeapCreateInfo,
    pub flags: IsolateFlags,
    pub registry: Arc<dyn PortRegistry>,
    pub codec: Arc<dyn MessageCodec>,
}

impl Default for IsolateCreateInfo {
    fn default() -> Self {
        Self {
            name_prefix: None,
            stack_size: DEFAULT_STACK_SIZE,
            heap: HeapCreateInfo::default(),
            flags: IsolateFlags::default(),
            registry: PortMap::global(),
            codec: Arc::new(SnapshotCodec),
        }
    }
}

/// An independently scheduled execution context with its own heap and
/// inbox.
///
/// An isolate runs on one thread at a time. Only its inbox and interrupt
/// word are shared with other threads.
pub struct Isolate {
    // Fields drop in declaration order: the handler goes before the heap.
    message_handler: Option<MessageHandler>,
    pub(crate) heap: Heap,
    pub(crate) object_store: ObjectStore,
    pub(crate) debugger: Debugger,
    pub(crate) stub_code: StubCode,
    pub(crate) api_state: ApiState,
    pub(crate) class_table: ClassTable,
    pub(crate) megamorphic_cache_table: MegamorphicCacheTable,
    pub(crate) zones: Zones,
    pub(crate) stack: Stack,
    top_context: Value,
    ic_data_array: Value,
    deopt_id: i64,
    interrupts: Arc<InterruptWord>,
    pub(crate) registry: Arc<dyn PortRegistry>,
    pub(crate) codec: Arc<dyn MessageCodec>,
    id: IsolateId,
    name: String,
    main_port: PortId,
    start_time: SystemTime,
    stack_size: usize,
    flags: IsolateFlags,
    pub(crate) counters: Counters,
    owner: Option<ThreadId>,
    shut_down: bool,
}

impl Isolate {
    /// Create an isolate and bind it to the calling thread.
    ///
    /// Panics if the thread already runs an isolate or the heap cannot hold
    /// the bootstrap objects.
    pub fn new(info: IsolateCreateInfo) -> Self {
        assert!(
            info.stack_size > STACK_SIZE_BUFFER,
            "stack size must exceed {STACK_SIZE_BUFFER} bytes"
        );
        let interrupts = Arc::new(InterruptWord::new(usize::MAX));
        let handler = MessageHandler::new(interrupts.clone());
        let main_port = info.registry.create_port(handler.inbox());
        handler.inbox().set_main_port(main_port);

        let prefix = info.name_prefix.as_deref().unwrap_or(DEFAULT_NAME_PREFIX);
        let name = format!("{prefix}-{main_port}");

        let mut heap = Heap::new(info.heap);
        let mut class_table = ClassTable::new();
        let mut object_store = ObjectStore::new(&mut heap, &mut class_table)
            .unwrap_or_else(|err| panic!("{name}: cannot bootstrap: {err}"));
        object_store.set_unhandled_exception_handler(
            info.flags.unhandled_exception_handler.clone(),
        );

        let mut isolate = Self {
            message_handler: Some(handler),
            heap,
            object_store,
            debugger: Debugger::new(),
            stub_code: StubCode::new(),
            api_state: ApiState::new(),
            class_table,
            megamorphic_cache_table: MegamorphicCacheTable::new(),
            zones: Zones::new(),
            stack: Stack::new(),
            top_context: Value::Null,
            ic_data_array: Value::Null,
            deopt_id: 0,
            interrupts,
            registry: info.registry,
            codec: info.codec,
            id: IsolateId::next(),
            name,
            main_port,
            start_time: SystemTime::now(),
            stack_size: info.stack_size,
            flags: info.flags,
            counters: Counters::default(),
            owner: None,
            shut_down: false,
        };
        isolate.enter();
        isolate.debugger.initialize(&isolate.name);

        if isolate.flags.trace_isolates && prefix != VM_ISOLATE_PREFIX {
            log::info!(
                "[+] Starting isolate: {} (main port {main_port})",
                isolate.name
            );
        }
        if let Some(callback) = callbacks::create_callback() {
            callback(&isolate);
        }
        isolate
    }

    pub fn id(&self) -> IsolateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The isolate's identity.
    pub fn main_port(&self) -> PortId {
        self.main_port
    }

    pub fn start_time(&self) -> SystemTime {
        self.start_time
    }

    pub fn start_time_micros(&self) -> u128 {
        self.start_time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros())
            .unwrap_or(0)
    }

    pub fn flags(&self) -> &IsolateFlags {
        &self.flags
    }

    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn is_current(&self) -> bool {
        scope::current_isolate_id() == Some(self.id)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Bind to the calling thread and take the stack limit from here.
    pub fn enter(&mut self) {
        assert!(!self.shut_down, "{}: entered after shutdown", self.name);
        if let Some(owner) = self.owner {
            panic!("{}: still entered on thread {owner:?}", self.name);
        }
        scope::bind(self.id);
        self.owner = Some(thread::current().id());
        self.set_stack_limit_from_stack_top(current_stack_pointer());
    }

    /// Unbind from the calling thread. No program code can run until the
    /// isolate is entered again.
    pub fn exit(&mut self) {
        self.interrupts.set_stack_limit(usize::MAX);
        scope::unbind(self.id);
        self.owner = None;
    }

    /// The thread the isolate is entered on, if any.
    pub fn owner(&self) -> Option<ThreadId> {
        self.owner
    }

    pub(crate) fn set_stack_limit_from_stack_top(&self, stack_top: usize) {
        let usable = self.stack_size - STACK_SIZE_BUFFER;
        self.interrupts.set_stack_limit(stack_top.saturating_sub(usable));
    }

    pub fn interrupts(&self) -> &Arc<InterruptWord> {
        &self.interrupts
    }

    pub fn stack_limit(&self) -> usize {
        self.interrupts.stack_limit()
    }

    pub fn saved_stack_limit(&self) -> usize {
        self.interrupts.saved_stack_limit()
    }

    pub fn schedule_interrupts(&self, kinds: InterruptKind) {
        self.interrupts.schedule_interrupts(kinds);
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn object_store(&self) -> &ObjectStore {
        &self.object_store
    }

    pub fn object_store_mut(&mut self) -> &mut ObjectStore {
        &mut self.object_store
    }

    pub fn class_table(&self) -> &ClassTable {
        &self.class_table
    }

    pub fn class_table_mut(&mut self) -> &mut ClassTable {
        &mut self.class_table
    }

    pub fn megamorphic_cache_table_mut(&mut self) -> &mut MegamorphicCacheTable {
        &mut self.megamorphic_cache_table
    }

    pub fn stub_code_mut(&mut self) -> &mut StubCode {
        &mut self.stub_code
    }

    pub fn api_state(&self) -> &ApiState {
        &self.api_state
    }

    pub fn api_state_mut(&mut self) -> &mut ApiState {
        &mut self.api_state
    }

    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }

    pub fn debugger_mut(&mut self) -> &mut Debugger {
        &mut self.debugger
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn message_handler(&self) -> Option<&MessageHandler> {
        self.message_handler.as_ref()
    }

    pub(crate) fn inbox(&self) -> Arc<Inbox> {
        match &self.message_handler {
            Some(handler) => handler.inbox().clone(),
            None => panic!("{}: message handler is gone", self.name),
        }
    }

    pub fn registry(&self) -> &Arc<dyn PortRegistry> {
        &self.registry
    }

    pub fn sticky_error(&self) -> Option<&Failure> {
        self.object_store.sticky_error()
    }

    pub fn clear_sticky_error(&mut self) -> Option<Failure> {
        self.object_store.clear_sticky_error()
    }

    pub fn top_context(&self) -> Value {
        self.top_context
    }

    pub fn set_top_context(&mut self, context: Value) {
        self.top_context = context;
    }

    pub fn ic_data_array(&self) -> Value {
        self.ic_data_array
    }

    pub fn set_ic_data_array(&mut self, array: Value) {
        self.ic_data_array = array;
    }

    /// Inline cache data recorded for `deopt_id` in the active array.
    pub fn ic_data_for_deopt_id(&self, deopt_id: i64) -> Option<Value> {
        let index = usize::try_from(deopt_id).ok()?;
        self.heap.array(self.ic_data_array)?.get(index).copied()
    }

    pub fn next_deopt_id(&mut self) -> i64 {
        let id = self.deopt_id;
        self.deopt_id += 1;
        id
    }

    /// Run `f` with a fresh zone open. Handles made inside are roots until
    /// it returns.
    pub fn with_zone<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.zones.push();
        let result = f(self);
        self.zones.pop();
        result
    }

    pub fn new_handle(&mut self, value: Value) -> ZoneHandle {
        self.zones.new_handle(value)
    }

    pub fn handle(&self, handle: ZoneHandle) -> Value {
        self.zones.get(handle)
    }

    /// Open a receive port on this isolate. Program-created ports are live.
    pub fn create_port(&mut self) -> PortId {
        let port = self.registry.create_port(&self.inbox());
        self.registry.set_live(port);
        port
    }

    /// Keep the isolate running on its main port.
    pub fn set_main_port_live(&self) {
        self.registry.set_live(self.main_port);
    }

    pub fn close_port(&mut self, port: PortId) -> bool {
        self.registry.close_port(port)
    }

    pub fn post_message(&self, message: Message) -> bool {
        self.registry.post_message(message)
    }

    /// Encode `value` and post it to `dest`. Returns whether the port
    /// accepted it.
    pub fn send(
        &self,
        dest: PortId,
        reply: PortId,
        value: Value,
        priority: Priority,
    ) -> Result<bool, CodecError> {
        let data = self.codec.encode(&self.heap, value)?;
        Ok(self.post_message(Message::new(dest, reply, data, priority)))
    }

    pub(crate) fn out_of_memory_failure(&self) -> Failure {
        Failure::UnhandledException {
            exception: self.object_store.out_of_memory(),
            stacktrace: Value::Null,
        }
    }

    pub(crate) fn stack_overflow_failure(&self) -> Failure {
        Failure::UnhandledException {
            exception: self.object_store.stack_overflow(),
            stacktrace: Value::Null,
        }
    }

    /// Safe point. Cheap unless the stack limit is crossed or an interrupt
    /// is pending.
    #[inline]
    pub fn check_interrupts(&mut self) -> Result<(), Failure> {
        let sp = current_stack_pointer();
        if !self.interrupts.stack_overflow_or_interrupt(sp) {
            return Ok(());
        }
        self.handle_stack_overflow_or_interrupt(sp)
    }

    #[cold]
    fn handle_stack_overflow_or_interrupt(&mut self, sp: usize) -> Result<(), Failure> {
        if sp <= self.interrupts.saved_stack_limit() {
            return Err(self.stack_overflow_failure());
        }
        let kinds = self.interrupts.get_and_clear_interrupts();
        if kinds.is_empty() {
            return Ok(());
        }
        // a MESSAGE bit whose queue was already drained is stale
        let mut delivered = !kinds.difference(InterruptKind::MESSAGE).is_empty();
        if kinds.contains(InterruptKind::STORE_BUFFER) {
            log::debug!("{}: store buffer interrupt", self.name);
        }
        if kinds.contains(InterruptKind::MESSAGE) {
            let (handled, _) = self.drain_oob_messages();
            delivered |= handled > 0;
        }
        if delivered {
            self.counters.interrupts_delivered += 1;
        }
        if kinds.contains(InterruptKind::API) {
            if let Some(callback) = callbacks::interrupt_callback() {
                if !callback(self) {
                    return Err(Failure::Unwind(format!(
                        "{}: interrupted by the embedder",
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Run a program function with a frame pushed for it.
    ///
    /// The frame holds its own copy of `args`, and that copy is what root
    /// visitors see. Entries that keep an argument across a safe point or a
    /// root visit reread it with [`Isolate::argument`].
    pub fn invoke_static(&mut self, function: &Arc<Function>, args: &[Value]) -> Outcome {
        self.check_interrupts()?;
        function.record_invocation();
        self.stack.push(Frame::new(
            function.shared_name(),
            current_stack_pointer(),
            args.to_vec(),
        ));
        let result = (function.entry())(self, args);
        self.stack.pop();
        result
    }

    /// Argument `index` of the innermost frame, as last updated by a visitor.
    pub fn argument(&self, index: usize) -> Option<Value> {
        self.stack
            .frames()
            .next()
            .and_then(|frame| frame.slots().get(index).copied())
    }

    /// Drive `visitor` over every strong root, in a fixed order.
    pub fn visit_object_pointers(
        &mut self,
        visitor: &mut dyn ObjectPointerVisitor,
        visit_prologue_weak_handles: bool,
        validate_frames: bool,
    ) {
        self.object_store.visit_object_pointers(visitor);
        self.class_table.visit_object_pointers(visitor);
        self.megamorphic_cache_table.visit_object_pointers(visitor);
        self.stub_code.visit_object_pointers(visitor);
        self.zones.visit_object_pointers(visitor);
        self.stack.visit_frames(visitor, validate_frames);
        self.api_state
            .visit_roots(visitor, visit_prologue_weak_handles);
        visitor.visit_pointer(&mut self.top_context);
        visitor.visit_pointer(&mut self.ic_data_array);
        self.debugger.visit_object_pointers(visitor);
    }

    pub fn visit_weak_persistent_handles(
        &mut self,
        visitor: &mut dyn HandleVisitor,
        visit_prologue_weak_handles: bool,
    ) {
        self.api_state
            .visit_weak_handles(visitor, visit_prologue_weak_handles);
    }

    /// Tear the isolate down. Must run on the owning thread with no zones or
    /// frames open, and only once.
    pub fn shutdown(&mut self) {
        assert!(!self.shut_down, "{}: shut down twice", self.name);
        assert!(
            self.is_current(),
            "{}: shutdown off the owning thread",
            self.name
        );
        assert!(
            self.zones.is_empty() && self.stack.is_empty(),
            "{}: shutdown with {} zones and {} frames open",
            self.name,
            self.zones.depth(),
            self.stack.depth()
        );
        debug_assert!(self.heap.verify(), "{}: heap inconsistent", self.name);

        if let Some(callback) = callbacks::shutdown_callback() {
            callback(self);
        }
        self.with_zone(|isolate| isolate.debugger.shutdown());

        if let Some(handler) = self.message_handler.take() {
            self.registry.close_ports(handler.inbox());
            drop(handler);
        }

        let finalized = self.api_state.finalize_weak_handles();
        log::debug!("{}: finalized {finalized} weak handles", self.name);

        self.counters.report(&self.name);
        if self.flags.report_usage_count {
            print_invoked_functions(&self.name, &self.object_store);
        }
        if self.flags.trace_isolates {
            self.heap.print_sizes(&self.name);
            self.megamorphic_cache_table.print_sizes(&self.name);
            if !self.name.starts_with(VM_ISOLATE_PREFIX) {
                log::info!("[-] Stopping isolate: {}", self.name);
            }
        }

        self.object_store.clear_sticky_error();
        self.shut_down = true;
        self.interrupts.set_stack_limit(usize::MAX);
        scope::unbind(self.id);
        self.owner = None;
    }
}

impl Drop for Isolate {
    fn drop(&mut self) {
        if self.shut_down {
            return;
        }
        log::warn!("{}: dropped without shutdown", self.name);
        if let Some(handler) = self.message_handler.take() {
            self.registry.close_ports(handler.inbox());
        }
        if self.is_current() {
            scope::unbind(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_info, install_library};
    use crate::{FinalizablePersistentHandle, ObjectRef, PortMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn creation_binds_names_and_registers_main_port() {
        let registry = Arc::new(PortMap::new());
        let mut isolate = Isolate::new(IsolateCreateInfo {
            registry: registry.clone(),
            ..create_info()
        });
        assert!(isolate.is_current());
        assert_eq!(isolate.main_port(), PortId(1));
        assert_eq!(isolate.name(), "test-1");
        assert!(isolate.saved_stack_limit() < current_stack_pointer());
        assert_eq!(registry.port_count(), 1);
        isolate.shutdown();
    }

    #[test]
    #[should_panic(expected = "already runs isolate")]
    fn one_isolate_per_thread() {
        let _first = Isolate::new(create_info());
        let _second = Isolate::new(create_info());
    }

    #[test]
    fn isolates_can_take_turns_on_a_thread() {
        let mut a = Isolate::new(create_info());
        a.exit();
        let mut b = Isolate::new(create_info());
        assert!(b.is_current() && !a.is_current());
        b.shutdown();
        a.enter();
        a.shutdown();
    }

    #[test]
    fn shutdown_closes_ports_and_finalizes_weak_handles() {
        let registry = Arc::new(PortMap::new());
        let mut isolate = Isolate::new(IsolateCreateInfo {
            registry: registry.clone(),
            ..create_info()
        });
        let extra = isolate.create_port();
        let inbox = isolate.inbox();

        let finalized = Arc::new(AtomicUsize::new(0));
        for peer in 1..=3 {
            let finalized = finalized.clone();
            let s = isolate.heap_mut().allocate_string("weak").unwrap();
            isolate.api_state_mut().new_weak(
                Value::Ref(s),
                peer,
                peer == 1,
                Some(Box::new(move |_| {
                    finalized.fetch_add(1, Ordering::SeqCst);
                })),
            );
        }
        isolate
            .debugger_mut()
            .set_breakpoint("main", 1);

        isolate.shutdown();

        assert!(isolate.message_handler().is_none());
        assert!(registry.ports_of(&inbox).is_empty());
        assert!(!registry.is_live(extra));
        assert!(!isolate.post_message(Message::new(
            isolate.main_port(),
            crate::ILLEGAL_PORT,
            vec![0u8],
            Priority::Normal,
        )));
        assert_eq!(finalized.load(Ordering::SeqCst), 3);
        let mut touched = 0;
        isolate.visit_weak_persistent_handles(
            &mut |_: &mut FinalizablePersistentHandle| touched += 1,
            true,
        );
        assert_eq!(touched, 0);
        assert!(!isolate.debugger().is_active());
        assert!(!isolate.is_current());
    }

    #[test]
    #[should_panic(expected = "shut down twice")]
    fn double_shutdown_is_fatal() {
        let mut isolate = Isolate::new(create_info());
        isolate.shutdown();
        isolate.shutdown();
    }

    #[test]
    fn roots_are_visited_in_fixed_order() {
        let mut isolate = Isolate::new(create_info());
        let marker = |isolate: &mut Isolate, label: &str| {
            Value::Ref(isolate.heap_mut().allocate_string(label).unwrap())
        };
        let cache = marker(&mut isolate, "cache");
        let stub = marker(&mut isolate, "stub");
        let zone = marker(&mut isolate, "zone");
        let frame = marker(&mut isolate, "frame");
        let api = marker(&mut isolate, "api");
        let context = marker(&mut isolate, "context");
        let ic_data = marker(&mut isolate, "ic-data");
        let retained = marker(&mut isolate, "debugger");

        isolate.megamorphic_cache_table_mut().lookup_or_insert(cache);
        isolate.stub_code_mut().install("call", stub);
        isolate.api_state_mut().new_persistent(api);
        isolate.set_top_context(context);
        isolate.set_ic_data_array(ic_data);
        isolate.debugger_mut().retain(retained);
        let sentinel = isolate.object_store().out_of_memory();
        let class = isolate.class_table().at(0).unwrap();

        let visit = install_library(&mut isolate, |lib| {
            lib.add_function("visit", |isolate, _| {
                let mut seen = Vec::new();
                isolate.visit_object_pointers(
                    &mut |slot: &mut Value| seen.push(*slot),
                    false,
                    true,
                );
                let seen = isolate.heap_mut().allocate_array(&seen).unwrap();
                Ok(Value::Ref(seen))
            });
        });
        let function = isolate
            .object_store()
            .library(visit)
            .lookup_local_function("visit")
            .unwrap();

        let seen = isolate.with_zone(|isolate| {
            isolate.new_handle(zone);
            isolate.invoke_static(&function, &[frame]).unwrap()
        });
        let seen = isolate.heap().array(seen).unwrap().to_vec();
        let position = |v: Value| seen.iter().position(|&s| s == v).unwrap();
        let order: Vec<usize> = [
            sentinel, class, cache, stub, zone, frame, api, context, ic_data, retained,
        ]
        .into_iter()
        .map(position)
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "order was {order:?}");
        isolate.shutdown();
    }

    #[test]
    fn visitors_relocate_roots_in_place() {
        let mut isolate = Isolate::new(create_info());
        let s = isolate.heap_mut().allocate_string("x").unwrap();
        let persistent = isolate.api_state_mut().new_persistent(Value::Ref(s));
        isolate.set_top_context(Value::Ref(s));
        isolate.object_store_mut().set_sticky_error(Failure::UnhandledException {
            exception: Value::Ref(s),
            stacktrace: Value::Smi(3),
        });

        let moved = ObjectRef(s.0 + 1000);
        isolate.visit_object_pointers(
            &mut |slot: &mut Value| {
                if *slot == Value::Ref(s) {
                    *slot = Value::Ref(moved);
                }
            },
            true,
            false,
        );
        assert_eq!(isolate.top_context(), Value::Ref(moved));
        assert_eq!(
            isolate.api_state().persistent(persistent),
            Some(Value::Ref(moved))
        );
        assert_eq!(
            isolate.sticky_error(),
            Some(&Failure::UnhandledException {
                exception: Value::Ref(moved),
                stacktrace: Value::Smi(3),
            })
        );
        isolate.clear_sticky_error();
        isolate.shutdown();
    }

    #[test]
    fn deep_recursion_hits_the_stack_overflow_sentinel() {
        let mut isolate = Isolate::new(IsolateCreateInfo {
            stack_size: 64 * 1024,
            ..create_info()
        });
        install_library(&mut isolate, |lib| {
            lib.add_function("recurse", |isolate, args| {
                let function = isolate.lookup_function("recurse").unwrap();
                isolate.invoke_static(&function, args)
            });
        });
        let recurse = isolate.lookup_function("recurse").unwrap();
        let result = isolate.invoke_static(&recurse, &[]);
        assert_eq!(result, Err(isolate.stack_overflow_failure()));
        assert!(isolate.stack().is_empty());
        assert!(recurse.usage_count() > 1);
        isolate.shutdown();
    }

    #[test]
    fn nothing_runs_outside_an_entered_isolate() {
        let mut isolate = Isolate::new(create_info());
        install_library(&mut isolate, |lib| {
            lib.add_function("noop", |_, _| Ok(Value::Null));
        });
        let noop = isolate.lookup_function("noop").unwrap();
        isolate.exit();
        assert_eq!(isolate.stack_limit(), usize::MAX);
        assert!(isolate.invoke_static(&noop, &[]).is_err());
        {
            let mut scope = crate::IsolateScope::enter(&mut isolate);
            assert!(scope.is_current());
            assert_eq!(scope.invoke_static(&noop, &[]), Ok(Value::Null));
        }
        assert!(!isolate.is_current());
        isolate.enter();
        isolate.shutdown();
    }

    #[test]
    fn ic_data_is_read_from_the_active_array() {
        let mut isolate = Isolate::new(create_info());
        assert_eq!(isolate.ic_data_for_deopt_id(0), None);
        let array = isolate
            .heap_mut()
            .allocate_array(&[Value::Smi(10), Value::Smi(11)])
            .unwrap();
        isolate.set_ic_data_array(Value::Ref(array));
        assert_eq!(isolate.next_deopt_id(), 0);
        assert_eq!(isolate.next_deopt_id(), 1);
        assert_eq!(isolate.ic_data_for_deopt_id(1), Some(Value::Smi(11)));
        assert_eq!(isolate.ic_data_for_deopt_id(2), None);
        assert_eq!(isolate.ic_data_for_deopt_id(-1), None);
        isolate.shutdown();
    }

    #[test]
    fn entries_reread_relocated_arguments_from_their_frame() {
        let mut isolate = Isolate::new(create_info());
        let s = isolate.heap_mut().allocate_string("arg").unwrap();
        let moved = Value::Ref(ObjectRef(s.0 + 1000));
        install_library(&mut isolate, move |lib| {
            lib.add_function("relocate", move |isolate, args| {
                isolate.visit_object_pointers(
                    &mut |slot: &mut Value| {
                        if *slot == args[0] {
                            *slot = moved;
                        }
                    },
                    false,
                    true,
                );
                assert_eq!(isolate.argument(1), None);
                Ok(isolate.argument(0).unwrap_or(Value::Null))
            });
        });
        let relocate = isolate.lookup_function("relocate").unwrap();
        assert_eq!(isolate.argument(0), None);
        assert_eq!(isolate.invoke_static(&relocate, &[Value::Ref(s)]), Ok(moved));
        isolate.shutdown();
    }

    #[test]
    #[serial_test::serial]
    fn host_hooks_bracket_the_isolate_lifetime() {
        let registry = Arc::new(PortMap::new());
        let created = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let stopped = Arc::new(parking_lot::Mutex::new(Vec::new()));
        {
            let created = created.clone();
            callbacks::set_create_callback(Some(Arc::new(move |isolate: &Isolate| {
                // other tests create isolates concurrently
                if isolate.name().starts_with("hooks-") {
                    created.lock().push((isolate.id(), isolate.is_current()));
                }
            })));
        }
        {
            let (stopped, registry) = (stopped.clone(), registry.clone());
            callbacks::set_shutdown_callback(Some(Arc::new(move |isolate: &Isolate| {
                if isolate.name().starts_with("hooks-") {
                    stopped.lock().push((isolate.id(), registry.port_count()));
                }
            })));
        }

        let mut isolate = Isolate::new(IsolateCreateInfo {
            name_prefix: Some("hooks".into()),
            registry: registry.clone(),
            ..create_info()
        });
        let id = isolate.id();
        isolate.create_port();
        assert_eq!(*created.lock(), [(id, true)]);
        assert!(stopped.lock().is_empty());

        isolate.shutdown();
        callbacks::clear_callbacks();
        assert_eq!(*created.lock(), [(id, true)]);
        // both ports were still open when the hook ran
        assert_eq!(*stopped.lock(), [(id, 2)]);
        assert_eq!(registry.port_count(), 0);
    }
}
