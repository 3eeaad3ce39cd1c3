/// 配置文件解析
pub mod config;

/// 输入设备与键盘映射的描述模型
pub mod device_model;

/// 输入事件的抽象层, 定义事件模型
pub mod event_model;

/// seat 门面: 每块显示对应一个 seat, 聚合它名下的全部输入设备
pub mod seat;

// `seat` 是整个项目的门面。设备列表、keymap、触摸模式这些都从它问，信号也从它出
// 平台差异全部封在 `SeatBackend` 这个 trait 后面，门面自己只拿着无障碍配置
// 和抑制计数，别的一概现场问后端。设备列表永远从后端现读，不做缓存

// 信号就一个枚举加一个注册表。发射前先把处理器快照出来，
// 处理器里再 connect 不会影响正在进行的这一轮，新处理器等下一轮
// 要不要上 async.. 单线程 Rc/RefCell 足够了，这东西本来就该贴着主循环跑

// 无障碍配置按整值比较，任何一个字段变了就算变。真正管开关的是 controls 掩码：
// 从 0 变成非 0 才算启用，非 0 变 0 才算停用，中间怎么改都只是换参数
// dwell 的计时引擎不在这里，门面只负责把核心指针挂给它/从它摘下来

// `backend_evdev` 直接啃 /dev/input，要求对节点有读权限
// 没上 udev，热插拔靠每两秒重扫目录，够用了
// 虚拟设备走 uinput，写出去的事件会被重扫当成新设备捡回来，正好当回环测试
// HACK: MT 触摸现在只认 BTN_TOUCH，每个节点只给一个触点，真多指得解析 slot 协议

// `backend_wayland` 是纯观察者：能力位、seat 名字、keymap、锁定键，到此为止
// 没有 surface 就没有坐标流，注入和独占更别想，这是协议决定的

// `backend_headless` 给测试和无显示环境用，时钟是手拨的

// TODO: libei 后端，合成器总算有注入协议了
// TODO: wp_pointer_warp_v1 已进 staging，等 wayland-protocols 发版就把 warp 接上
