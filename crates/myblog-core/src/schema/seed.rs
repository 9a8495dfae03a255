//! Baseline content: settings, about-page cards, and the first admin.

use std::collections::HashSet;

use rusqlite::Connection;

use crate::auth::password::hash_password;
use crate::auth::token::ADMIN_ROLE;
use crate::error::Result;
use crate::storage::{
    AboutCardRepository, NewMainCard, NewSubCard, NewUser, Setting, SettingRepository,
    SqliteStore, UserRepository,
};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";

/// `(key, value, type, description, category)`
pub const BASELINE_SETTINGS: &[(&str, &str, &str, &str, &str)] = &[
    ("background_image", "/img/test.webp", "string", "页面背景图片路径", "appearance"),
    ("global_opacity", "0.15", "number", "全局透明度 (0-1)", "appearance"),
    ("background_size", "cover", "string", "背景图片尺寸 (cover, contain, auto)", "appearance"),
    ("background_position", "center", "string", "背景图片位置", "appearance"),
    ("background_repeat", "no-repeat", "string", "背景图片重复方式", "appearance"),
    ("background_attachment", "fixed", "string", "背景图片滚动方式", "appearance"),
    ("blur_amount", "20px", "string", "背景模糊程度", "appearance"),
    ("saturate_amount", "180%", "string", "背景饱和度", "appearance"),
    ("dark_mode_enabled", "false", "boolean", "是否启用暗色模式", "appearance"),
    ("navbar_glass_color", "rgba(220, 138, 221, 0.15)", "string", "导航栏毛玻璃颜色", "appearance"),
    ("navbar_text_color", "#333333", "string", "导航栏文字颜色", "appearance"),
    ("card_glass_color", "rgba(220, 138, 221, 0.2)", "string", "页面卡片毛玻璃颜色", "appearance"),
    ("footer_glass_color", "rgba(220, 138, 221, 0.25)", "string", "底栏毛玻璃颜色", "appearance"),
    ("template_name", "欢迎来到我的博客", "string", "个人主页标题", "template"),
    ("template_greting", "这是一个个人博客系统，支持文章管理、数据分析等功能。", "string", "首页欢迎语", "template"),
    ("template_year", "2026", "string", "版权年份", "template"),
    ("template_foods", "我的博客", "string", "页脚信息", "template"),
    ("template_article_title", "true", "boolean", "是否显示文章标题", "template"),
    ("template_article_title_prefix", "文章", "string", "文章标题前缀", "template"),
    ("template_switch_notice", "true", "boolean", "是否显示切换界面提示", "template"),
    ("template_switch_notice_text", "回来继续阅读", "string", "切换标签页时显示的提示文字", "template"),
    ("external_link_warning", "true", "boolean", "是否启用外部链接跳转警告", "template"),
    ("external_link_whitelist", "github.com,gitee.com,stackoverflow.com", "string", "外部链接白名单（逗号分隔的域名）", "template"),
    ("external_link_warning_text", "您即将离开本站，前往外部链接", "string", "外部链接警告提示文字", "template"),
    ("live2d_enabled", "false", "boolean", "是否启用 Live2D 看板娘", "template"),
    ("live2d_show_on_index", "true", "boolean", "是否在首页显示 Live2D", "template"),
    ("live2d_show_on_passage", "true", "boolean", "是否在文章页显示 Live2D", "template"),
    ("live2d_show_on_collect", "true", "boolean", "是否在归档页显示 Live2D", "template"),
    ("live2d_show_on_about", "true", "boolean", "是否在关于页显示 Live2D", "template"),
    ("live2d_show_on_admin", "false", "boolean", "是否在管理页显示 Live2D", "template"),
    ("live2d_model_id", "1", "string", "Live2D 模型 ID", "template"),
    ("live2d_model_path", "", "string", "Live2D 自定义模型路径（留空使用 CDN）", "template"),
    ("live2d_cdn_path", "https://unpkg.com/live2d-widget-model@1.0.5/", "string", "Live2D CDN 路径", "template"),
    ("live2d_position", "right", "string", "Live2D 显示位置（left/right）", "template"),
    ("live2d_width", "280px", "string", "Live2D 宽度", "template"),
    ("live2d_height", "250px", "string", "Live2D 高度", "template"),
    ("sponsor_enabled", "false", "boolean", "是否启用赞助功能", "template"),
    ("sponsor_title", "感谢您的支持", "string", "赞助模态框标题", "template"),
    ("sponsor_image", "/img/avatar.png", "string", "赞助图片路径", "template"),
    ("sponsor_description", "如果您觉得这个博客对您有帮助，欢迎赞助支持！", "string", "赞助描述文字", "template"),
    ("sponsor_button_text", "❤️ 赞助支持", "string", "赞助按钮文字", "template"),
    ("global_avatar", "/img/avatar.webp", "string", "全局头像路径", "template"),
    ("music_enabled", "false", "boolean", "是否启用音乐播放器", "appearance"),
    ("music_auto_play", "false", "boolean", "音乐是否自动播放", "appearance"),
    ("music_control_size", "medium", "string", "音乐控件大小 (small, medium, large)", "appearance"),
    ("music_custom_css", "", "string", "音乐播放器自定义CSS样式", "appearance"),
    ("music_player_color", "rgba(66, 133, 244, 0.9)", "string", "音乐播放器颜色 (RGBA格式)", "appearance"),
    ("music_position", "bottom-right", "string", "音乐播放器显示位置 (top-left, top-right, bottom-left, bottom-right)", "template"),
];

/// Sub card: `(title, description, icon, link_url)`
type SubCardSeed = (&'static str, &'static str, &'static str, &'static str);

/// Main card: `(title, icon, layout_type, sub cards)`. Sort order follows
/// position in the list.
pub const ABOUT_CARDS: &[(&str, &str, &str, &[SubCardSeed])] = &[
    (
        "项目简介",
        "📖",
        "default",
        &[
            ("欢迎", "欢迎来到我们的网站！这是一个专注于技术分享与知识管理的平台。", "", ""),
            ("目标", "我们的目标是构建一个开放、友好、专业的技术社区。", "", ""),
        ],
    ),
    (
        "核心特性",
        "⚡",
        "grid",
        &[
            ("高性能", "采用现代化技术栈，确保网站快速响应。", "🚀", ""),
            ("安全可靠", "多层安全防护机制，保护用户数据隐私。", "🔒", ""),
            ("全平台", "响应式设计，各类设备完美呈现。", "📱", ""),
            ("开放API", "提供完善的API接口，方便集成扩展。", "🌐", ""),
        ],
    ),
    (
        "开发团队",
        "👥",
        "grid",
        &[
            ("技术总监", "负责平台架构设计与技术选型。", "JD", ""),
            ("前端负责人", "专注于用户体验与交互设计。", "LW", ""),
            ("后端工程师", "负责服务器端逻辑与数据库设计。", "ZY", ""),
        ],
    ),
    (
        "联系我们",
        "📞",
        "flex",
        &[
            ("电子邮件", "contact@example.com", "📧", "mailto:contact@example.com"),
            ("GitHub", "github.com/ourproject", "🐙", "https://github.com/ourproject"),
            ("社交媒体", "@ourproject", "🐦", "https://twitter.com/ourproject"),
        ],
    ),
];

/// Insert every baseline setting whose key is absent. Returns how many were
/// inserted.
pub fn seed_settings(conn: &Connection) -> Result<usize> {
    let store = SqliteStore::new(conn);
    let existing: HashSet<String> = store.setting_keys()?.into_iter().collect();

    let mut inserted = 0;
    for (key, value, kind, description, category) in BASELINE_SETTINGS {
        if existing.contains(*key) {
            continue;
        }
        let setting = Setting {
            key: key.to_string(),
            value: value.to_string(),
            setting_type: kind.to_string(),
            description: description.to_string(),
            category: category.to_string(),
        };
        store
            .create_setting(&setting)
            .map_err(|e| e.wrap(format!("failed to insert default setting {}", key)))?;
        inserted += 1;
    }
    Ok(inserted)
}

/// Insert the about-page cards when there are none. Returns whether anything
/// was inserted.
pub fn seed_about_cards(conn: &Connection) -> Result<bool> {
    if SqliteStore::new(conn).count_main_cards()? > 0 {
        tracing::debug!("about cards present, skipping");
        return Ok(false);
    }

    let tx = conn.unchecked_transaction()?;
    {
        let store = SqliteStore::new(&tx);
        for (main_order, (title, icon, layout_type, subs)) in ABOUT_CARDS.iter().enumerate() {
            let main_id = store.create_main_card(&NewMainCard {
                title: title.to_string(),
                icon: icon.to_string(),
                layout_type: layout_type.to_string(),
                sort_order: main_order as i64 + 1,
            })?;
            for (sub_order, (sub_title, description, sub_icon, link_url)) in
                subs.iter().enumerate()
            {
                store.create_sub_card(
                    main_id,
                    &NewSubCard {
                        title: sub_title.to_string(),
                        description: description.to_string(),
                        icon: sub_icon.to_string(),
                        link_url: link_url.to_string(),
                        sort_order: sub_order as i64 + 1,
                    },
                )?;
            }
        }
    }
    tx.commit()?;
    Ok(true)
}

/// Create the default administrator when the users table is empty.
pub fn seed_admin(conn: &Connection) -> Result<bool> {
    let store = SqliteStore::new(conn);
    if store.count_users()? > 0 {
        return Ok(false);
    }

    let password_hash = hash_password(DEFAULT_ADMIN_PASSWORD)
        .map_err(|e| e.wrap("failed to hash default password"))?;
    store
        .create_user(&NewUser {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password_hash,
            email: Some(DEFAULT_ADMIN_EMAIL.to_string()),
            role: ADMIN_ROLE.to_string(),
            status: "active".to_string(),
        })
        .map_err(|e| e.wrap("failed to insert default admin"))?;
    tracing::warn!(
        username = DEFAULT_ADMIN_USERNAME,
        "created default admin account; change its password"
    );
    Ok(true)
}
